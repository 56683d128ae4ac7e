//! Dependency-ordered deployment sequencer.
//!
//! Runs a pre-ordered list of [`DeploymentSpec`]s one at a time. Each step resolves its
//! constructor arguments against the ledger built so far, submits the deployment, waits
//! for confirmation, then records the resulting address. The first failure stops the run.

use std::io::Write;

use crate::{
    client::ChainClient,
    ledger::{AlreadyRecorded, DeploymentLedger},
    spec::{ArgSource, ArgValue, DeploymentSpec, ModuleId},
};

/// Lifecycle of a single deployment step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StepState {
    Pending,
    Submitting,
    Confirming,
    Recorded,
    Failed,
}

/// Why a step failed.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// An argument references a module that has not been recorded yet.
    #[error("unresolved reference to module `{reference}`")]
    UnresolvedReference { reference: ModuleId },

    /// The chain client rejected the deployment request.
    #[error("deployment submission rejected")]
    Submission(#[source] anyhow::Error),

    /// The chain client failed while waiting for the deployment to be mined.
    #[error("deployment confirmation failed")]
    Confirmation(#[source] anyhow::Error),

    #[error(transparent)]
    DuplicateModule(#[from] AlreadyRecorded),
}

/// A run that stopped early.
///
/// Carries the failing module and every record confirmed before it, so an operator
/// can see exactly what is already on chain.
#[derive(Debug, thiserror::Error)]
#[error("deployment of `{module}` failed after {} completed step(s)", .ledger.len())]
pub struct SequencerError {
    pub module: ModuleId,
    pub ledger: DeploymentLedger,
    #[source]
    pub source: StepError,
}

/// Executes deployment specs strictly in order against a [`ChainClient`].
pub struct Sequencer<C> {
    client: C,
    notices: Box<dyn Write + Send>,
}

impl<C: ChainClient> Sequencer<C> {
    /// Create a sequencer that prints completion notices to stdout.
    pub fn new(client: C) -> Self {
        Self {
            client,
            notices: Box::new(std::io::stdout()),
        }
    }

    /// Send completion notices to `writer` instead of stdout.
    pub fn with_notices(mut self, writer: impl Write + Send + 'static) -> Self {
        self.notices = Box::new(writer);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Deploy every spec in order and return the resulting ledger.
    ///
    /// `specs` must already be ordered so that each reference names an earlier module.
    /// No reordering or up-front validation happens here.
    pub async fn run(&mut self, specs: &[DeploymentSpec]) -> Result<DeploymentLedger, SequencerError> {
        let mut ledger = DeploymentLedger::new();

        tracing::info!(steps = specs.len(), "Starting deployment pipeline");

        for spec in specs {
            if let Err(source) = self.step(spec, &mut ledger).await {
                tracing::error!(
                    module = %spec.module,
                    state = %StepState::Failed,
                    completed = ledger.len(),
                    error = %source,
                    "Deployment step failed, aborting run"
                );

                return Err(SequencerError {
                    module: spec.module.clone(),
                    ledger,
                    source,
                });
            }
        }

        tracing::info!(modules = ledger.len(), "Deployment pipeline complete");

        Ok(ledger)
    }

    async fn step(
        &mut self,
        spec: &DeploymentSpec,
        ledger: &mut DeploymentLedger,
    ) -> Result<(), StepError> {
        tracing::debug!(module = %spec.module, state = %StepState::Pending);

        // A repeated id must not reach the chain.
        if ledger.contains(&spec.module) {
            return Err(AlreadyRecorded(spec.module.clone()).into());
        }

        let args = resolve_args(spec, ledger)?;

        tracing::debug!(
            module = %spec.module,
            contract = %spec.contract,
            state = %StepState::Submitting,
            args = ?args,
        );

        let pending = self
            .client
            .deploy_contract(&spec.contract, &args, &spec.options)
            .await
            .map_err(StepError::Submission)?;

        tracing::debug!(
            module = %spec.module,
            state = %StepState::Confirming,
            tx_hash = ?pending.tx_hash,
        );

        let confirmed = self
            .client
            .wait_for_deployment(pending)
            .await
            .map_err(StepError::Confirmation)?;

        let record = ledger.record(
            spec.module.clone(),
            spec.contract.clone(),
            confirmed.address,
            confirmed.tx_hash,
        )?;

        tracing::info!(
            module = %record.module,
            address = %record.address,
            sequence = record.sequence,
            state = %StepState::Recorded,
            "Module deployed"
        );

        if let Err(e) = writeln!(self.notices, "{record}") {
            tracing::warn!(error = %e, module = %record.module, "Failed to write completion notice");
        }

        Ok(())
    }
}

/// Substitute recorded addresses for references; literals pass through untouched.
pub fn resolve_args(
    spec: &DeploymentSpec,
    ledger: &DeploymentLedger,
) -> Result<Vec<ArgValue>, StepError> {
    spec.args
        .iter()
        .map(|arg| match arg {
            ArgSource::Literal(value) => Ok(ArgValue::Literal(value.clone())),
            ArgSource::Ref(module) => ledger
                .address_of(module)
                .map(ArgValue::Address)
                .ok_or_else(|| StepError::UnresolvedReference {
                    reference: module.clone(),
                }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use alloy_core::primitives::Address;

    use super::*;
    use crate::client::{ConfirmedDeployment, PendingDeployment};
    use crate::spec::DeployOptions;

    /// Deterministic client: the n-th deployment lands at `Address::repeat_byte(n + 1)`.
    #[derive(Default)]
    struct CountingClient {
        submitted: Mutex<Vec<(String, Vec<ArgValue>)>>,
        fail_submit_at: Option<usize>,
    }

    impl ChainClient for CountingClient {
        async fn deploy_contract(
            &self,
            contract: &str,
            args: &[ArgValue],
            _options: &DeployOptions,
        ) -> anyhow::Result<PendingDeployment> {
            let mut submitted = self.submitted.lock().unwrap();
            if self.fail_submit_at == Some(submitted.len()) {
                anyhow::bail!("insufficient funds");
            }
            submitted.push((contract.to_string(), args.to_vec()));
            Ok(PendingDeployment {
                contract: contract.to_string(),
                tx_hash: None,
            })
        }

        async fn wait_for_deployment(
            &self,
            _pending: PendingDeployment,
        ) -> anyhow::Result<ConfirmedDeployment> {
            let n = self.submitted.lock().unwrap().len();
            Ok(ConfirmedDeployment {
                address: Address::repeat_byte(n as u8),
                tx_hash: None,
            })
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(String::from)
                .collect()
        }
    }

    #[test]
    fn test_resolve_args_substitutes_in_place() {
        let mut ledger = DeploymentLedger::new();
        ledger
            .record("a".into(), "A", Address::repeat_byte(0xaa), None)
            .unwrap();
        let spec = DeploymentSpec::new("b", "B")
            .literal("first")
            .reference("a")
            .literal("last");

        let args = resolve_args(&spec, &ledger).unwrap();

        assert_eq!(
            args,
            vec![
                ArgValue::Literal("first".into()),
                ArgValue::Address(Address::repeat_byte(0xaa)),
                ArgValue::Literal("last".into()),
            ]
        );
    }

    #[test]
    fn test_resolve_args_reports_missing_reference() {
        let spec = DeploymentSpec::new("b", "B").reference("z");

        let err = resolve_args(&spec, &DeploymentLedger::new()).unwrap_err();

        assert!(matches!(
            err,
            StepError::UnresolvedReference { reference } if reference.as_str() == "z"
        ));
    }

    #[tokio::test]
    async fn test_run_emits_one_notice_per_step() {
        let out = SharedBuf::default();
        let mut sequencer = Sequencer::new(CountingClient::default()).with_notices(out.clone());
        let specs = vec![
            DeploymentSpec::new("factory", "KojikiFactory").literal("0x01"),
            DeploymentSpec::new("router", "KojikiRouter").reference("factory"),
        ];

        let ledger = sequencer.run(&specs).await.unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(
            out.lines(),
            vec![
                format!("factory contract {}", Address::repeat_byte(1)),
                format!("router contract {}", Address::repeat_byte(2)),
            ]
        );
    }

    #[tokio::test]
    async fn test_submission_failure_keeps_prior_records() {
        let client = CountingClient {
            fail_submit_at: Some(1),
            ..Default::default()
        };
        let mut sequencer = Sequencer::new(client).with_notices(std::io::sink());
        let specs = vec![
            DeploymentSpec::new("a", "A"),
            DeploymentSpec::new("b", "B"),
            DeploymentSpec::new("c", "C"),
        ];

        let err = sequencer.run(&specs).await.unwrap_err();

        assert_eq!(err.module.as_str(), "b");
        assert!(matches!(err.source, StepError::Submission(_)));
        assert_eq!(err.ledger.modules().map(|m| m.as_str()).collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(sequencer.client().submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_module_aborts_run() {
        let mut sequencer = Sequencer::new(CountingClient::default()).with_notices(std::io::sink());
        let specs = vec![DeploymentSpec::new("a", "A"), DeploymentSpec::new("a", "A")];

        let err = sequencer.run(&specs).await.unwrap_err();

        assert!(matches!(err.source, StepError::DuplicateModule(_)));
        assert_eq!(err.ledger.len(), 1);
        // The second `a` is rejected before submission.
        assert_eq!(sequencer.client().submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_pipeline_yields_empty_ledger() {
        let mut sequencer = Sequencer::new(CountingClient::default()).with_notices(std::io::sink());

        let ledger = sequencer.run(&[]).await.unwrap();

        assert!(ledger.is_empty());
    }
}
