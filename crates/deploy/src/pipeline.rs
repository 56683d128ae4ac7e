//! The fixed Kojiki deployment pipeline.
//!
//! Each [`KojikiModule`] variant knows its contract and constructor shape. Variants are
//! declared in deployment order; every reference points to an earlier variant.

use strum::IntoEnumIterator;

use crate::{
    config::KojikiConfig,
    spec::{DeploymentSpec, ModuleId},
};

/// Every module deployed by a Kojiki run, in order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum KojikiModule {
    Lock,
    Factory,
    Router,
    Sake,
    XSake,
    Master,
    NftPoolFactory,
    PositionHelper,
    RaitoPoolFactory,
    Dividends,
    FairAuction,
    YieldBooster,
    Launchpad,
    Multicall,
}

impl KojikiModule {
    pub fn id(&self) -> ModuleId {
        ModuleId::new(self.as_ref())
    }

    /// Name of the compiled contract.
    pub fn contract(&self) -> &'static str {
        match self {
            KojikiModule::Lock => "Lock",
            KojikiModule::Factory => "KojikiFactory",
            KojikiModule::Router => "KojikiRouter",
            KojikiModule::Sake => "SakeToken",
            KojikiModule::XSake => "SakeStakeToken",
            KojikiModule::Master => "KojikiMaster",
            KojikiModule::NftPoolFactory => "NFTPoolFactory",
            KojikiModule::PositionHelper => "PositionHelper",
            KojikiModule::RaitoPoolFactory => "RaitoPoolFactory",
            KojikiModule::Dividends => "Dividends",
            KojikiModule::FairAuction => "FairAuction",
            KojikiModule::YieldBooster => "YieldBooster",
            KojikiModule::Launchpad => "Launchpad",
            KojikiModule::Multicall => "Multicall2",
        }
    }

    /// Build this module's deployment spec.
    ///
    /// `now` is the run start as unix seconds; only the lock uses it.
    pub fn spec(&self, config: &KojikiConfig, now: u64) -> DeploymentSpec {
        use KojikiModule::*;

        let spec = DeploymentSpec::new(self.id(), self.contract());

        match self {
            Lock => spec
                .literal(config.lock.unlock_time(now).to_string())
                .value(config.lock.value.clone()),
            Factory => spec.literal(&config.owner),
            Router => spec.reference(Factory.id()).literal(&config.weth),
            Sake => spec
                .literal(&config.sake.max_supply)
                .literal(&config.sake.initial_supply)
                .literal(&config.sake.emission_rate)
                .literal(&config.owner),
            XSake => spec.reference(Sake.id()),
            Master => spec
                .reference(Sake.id())
                .literal(&config.master.start_time),
            NftPoolFactory => spec
                .reference(Master.id())
                .reference(Sake.id())
                .reference(XSake.id()),
            PositionHelper => spec.reference(Router.id()).literal(&config.weth),
            RaitoPoolFactory => spec
                .reference(Sake.id())
                .reference(XSake.id())
                .literal(&config.owner)
                .literal(&config.owner),
            Dividends => spec
                .reference(XSake.id())
                .literal(&config.dividends.start_time),
            FairAuction => {
                let auction = &config.fair_auction;
                spec.reference(Sake.id())
                    .reference(XSake.id())
                    .literal(&auction.sale_token)
                    .literal(&auction.lp_token)
                    .literal(&auction.start_time)
                    .literal(&auction.end_time)
                    .literal(&auction.treasury)
                    .literal(&auction.max_to_distribute)
                    .literal(&auction.min_to_raise)
                    .literal(&auction.max_to_raise)
                    .literal(&auction.cap_per_wallet)
                    .literal(&auction.max_raise_per_wallet_whitelist)
            }
            YieldBooster => spec.reference(XSake.id()),
            Launchpad => spec.reference(XSake.id()),
            Multicall => spec,
        }
    }
}

/// Current unix time in seconds, used as the run start for relative timestamps.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Specs for every module not in `skip`, in deployment order.
///
/// Skipping a module that a remaining module references yields a pipeline that
/// [`check_references`](crate::spec::check_references) rejects.
pub fn kojiki_pipeline(config: &KojikiConfig, now: u64, skip: &[KojikiModule]) -> Vec<DeploymentSpec> {
    KojikiModule::iter()
        .filter(|module| !skip.contains(module))
        .map(|module| module.spec(config, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ArgSource, OrderingError, check_references};

    const NOW: u64 = 1_692_000_000;

    #[test]
    fn test_default_pipeline_is_well_ordered() {
        let specs = kojiki_pipeline(&KojikiConfig::default(), NOW, &[]);

        assert_eq!(specs.len(), 14);
        assert_eq!(check_references(&specs), Ok(()));
    }

    #[test]
    fn test_module_ids_are_kebab_case() {
        let ids: Vec<String> = KojikiModule::iter().map(|m| m.to_string()).collect();

        assert_eq!(ids[0], "lock");
        assert!(ids.contains(&"x-sake".to_string()));
        assert!(ids.contains(&"nft-pool-factory".to_string()));
        assert_eq!("raito-pool-factory".parse::<KojikiModule>().unwrap(), KojikiModule::RaitoPoolFactory);
    }

    #[test]
    fn test_router_references_factory_then_weth() {
        let config = KojikiConfig::default();
        let router = KojikiModule::Router.spec(&config, NOW);

        assert_eq!(router.contract, "KojikiRouter");
        assert_eq!(
            router.args,
            vec![
                ArgSource::Ref("factory".into()),
                ArgSource::Literal(config.weth.clone()),
            ]
        );
    }

    #[test]
    fn test_lock_carries_value_and_relative_unlock() {
        let lock = KojikiModule::Lock.spec(&KojikiConfig::default(), NOW);

        assert_eq!(lock.args, vec![ArgSource::Literal((NOW + 60).to_string())]);
        assert_eq!(lock.options.value.as_deref(), Some("1000000000000000"));
    }

    #[test]
    fn test_fair_auction_has_twelve_arguments() {
        let auction = KojikiModule::FairAuction.spec(&KojikiConfig::default(), NOW);

        assert_eq!(auction.args.len(), 12);
        assert_eq!(auction.references().count(), 2);
    }

    #[test]
    fn test_skipping_a_dependency_breaks_ordering() {
        let specs = kojiki_pipeline(&KojikiConfig::default(), NOW, &[KojikiModule::Factory]);

        assert_eq!(
            check_references(&specs),
            Err(OrderingError::ForwardReference {
                module: "router".into(),
                reference: "factory".into(),
            })
        );
    }

    #[test]
    fn test_skipping_a_leaf_is_fine() {
        let specs = kojiki_pipeline(
            &KojikiConfig::default(),
            NOW,
            &[KojikiModule::Lock, KojikiModule::Multicall],
        );

        assert_eq!(specs.len(), 12);
        assert_eq!(specs[0].module.as_str(), "factory");
        assert_eq!(check_references(&specs), Ok(()));
    }
}
