//! Parameter encoding for CI trigger requests
//!
//! The CI pipeline receives the deployment configuration as query
//! parameters. Names are the upper-cased configuration field names and the
//! order is fixed, so the same input always yields the same parameter list.

use crate::models::{BlockChain, GenesisBlock, NodePorts, RepresentativeKey};
use panel_common::JobKind;
use thiserror::Error;

/// Ordered `(name, value)` pairs
pub type ParameterSet = Vec<(String, String)>;

/// Name of the correlation token parameter (the ledger entry id)
pub const CORRELATION_PARAM: &str = "BUILD_DEPLOY_ID";

/// Bucket names equal to this are treated as unset
const BUCKET_SENTINEL: &str = "None";

/// A required configuration field was empty
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required configuration field: {field}")]
pub struct EncodingError {
    pub field: String,
}

/// Builds the parameter set for each job kind
#[derive(Debug, Clone)]
pub struct ParameterEncoder {
    bucket_prefix: String,
}

impl ParameterEncoder {
    pub fn new(bucket_prefix: impl Into<String>) -> Self {
        Self {
            bucket_prefix: bucket_prefix.into(),
        }
    }

    /// Encode `chain` for a job of `kind` tracked by ledger entry `job_id`
    pub fn encode(
        &self,
        kind: JobKind,
        chain: &BlockChain,
        job_id: u64,
    ) -> Result<ParameterSet, EncodingError> {
        match kind {
            JobKind::Build => self.encode_build(chain, job_id),
            JobKind::Deploy | JobKind::Update => encode_deploy(chain, job_id),
            JobKind::Terminate => encode_terminate(chain, job_id),
        }
    }

    /// Storage bucket for `chain`
    pub fn bucket_name(&self, chain: &BlockChain) -> String {
        match chain.settings.s3_bucket_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() && name != BUCKET_SENTINEL => name.to_string(),
            _ => format!("{}-{}", self.bucket_prefix, chain.abbreviation()),
        }
    }

    fn encode_build(&self, chain: &BlockChain, job_id: u64) -> Result<ParameterSet, EncodingError> {
        let s = &chain.settings;
        let mut p = Params::default();

        p.required("abbreviation", &s.abbreviation)?;

        let genesis = &s.genesis;
        p.genesis("dev", &genesis.dev, true)?;
        p.genesis("beta", &genesis.beta, false)?;
        p.genesis("live", &genesis.live, false)?;
        p.genesis("test", &genesis.test, false)?;

        p.required("canary_beta_public_key", &s.canary.beta)?;
        p.required("canary_live_public_key", &s.canary.live)?;
        p.required("canary_test_public_key", &s.canary.test)?;
        p.required("faucet_public_key", &s.faucet_public_key)?;
        p.required("landing_public_key", &s.landing_public_key)?;

        p.representatives("beta", &s.representatives.beta)?;
        p.representatives("live", &s.representatives.live)?;

        p.ports("live", &s.ports.live)?;
        p.ports("beta", &s.ports.beta)?;
        p.ports("test", &s.ports.test)?;

        p.required("node_version", &s.versions.node)?;
        p.required("proxy_version", &s.versions.proxy)?;
        p.required("tools_version", &s.versions.tools)?;

        p.required("debug", &s.debug)?;
        p.required("logging", &s.logging)?;
        p.optional("custom_domain", &s.custom_domain);
        p.required("domain_svc", &s.domain_svc)?;
        p.flag("enable_custom_domain", s.enable_custom_domain);
        p.flag("binary_public", s.binary_public);
        p.value("number_of_peers", s.number_of_peers);
        p.required("total_supply", &s.total_supply)?;
        p.required("denomination", &s.denomination)?;

        p.value("s3_bucket_name", self.bucket_name(chain));
        p.correlation(job_id);

        Ok(p.finish())
    }
}

fn encode_deploy(chain: &BlockChain, job_id: u64) -> Result<ParameterSet, EncodingError> {
    let mut p = Params::default();
    p.required("abbreviation", chain.abbreviation())?;
    p.correlation(job_id);
    Ok(p.finish())
}

fn encode_terminate(chain: &BlockChain, job_id: u64) -> Result<ParameterSet, EncodingError> {
    let mut p = Params::default();
    p.required("abbreviation", chain.abbreviation())?;
    p.correlation(job_id);
    p.value("blockchain_id", chain.id);
    Ok(p.finish())
}

#[derive(Default)]
struct Params {
    out: ParameterSet,
}

impl Params {
    fn value(&mut self, field: &str, value: impl ToString) {
        self.out.push((field.to_ascii_uppercase(), value.to_string()));
    }

    fn required(&mut self, field: &str, value: &str) -> Result<(), EncodingError> {
        if value.trim().is_empty() {
            return Err(EncodingError {
                field: field.to_string(),
            });
        }
        self.value(field, value);
        Ok(())
    }

    fn optional(&mut self, field: &str, value: &str) {
        self.value(field, value);
    }

    fn flag(&mut self, field: &str, value: bool) {
        self.value(field, value);
    }

    fn correlation(&mut self, job_id: u64) {
        self.out.push((CORRELATION_PARAM.to_string(), job_id.to_string()));
    }

    fn genesis(
        &mut self,
        network: &str,
        block: &GenesisBlock,
        with_private_key: bool,
    ) -> Result<(), EncodingError> {
        self.required(&format!("genesis_{}_public_key", network), &block.public_key)?;
        if with_private_key {
            let field = format!("genesis_{}_private_key", network);
            let key = block.private_key.as_deref().unwrap_or_default();
            self.required(&field, key)?;
        }
        self.required(&format!("genesis_{}_account", network), &block.account)?;
        self.required(&format!("genesis_{}_work", network), &block.work)?;
        self.required(&format!("genesis_{}_signature", network), &block.signature)
    }

    fn representatives(
        &mut self,
        network: &str,
        reps: &[RepresentativeKey],
    ) -> Result<(), EncodingError> {
        if reps.is_empty() {
            return Err(EncodingError {
                field: format!("{}_pre_conf_rep_public_key_0", network),
            });
        }
        for (i, rep) in reps.iter().enumerate() {
            self.required(
                &format!("{}_pre_conf_rep_public_key_{}", network, i),
                &rep.public_key,
            )?;
        }
        for (i, rep) in reps.iter().enumerate() {
            self.required(
                &format!("{}_pre_conf_rep_private_key_{}", network, i),
                &rep.private_key,
            )?;
        }
        Ok(())
    }

    fn ports(&mut self, network: &str, ports: &NodePorts) -> Result<(), EncodingError> {
        for (field, port) in [
            (format!("{}_node_peering_port", network), ports.peering),
            (format!("{}_rpc_port", network), ports.rpc),
        ] {
            if port == 0 {
                return Err(EncodingError { field });
            }
            self.value(&field, port);
        }
        Ok(())
    }

    fn finish(self) -> ParameterSet {
        self.out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{
        CanaryKeys, ChainSettings, GenesisBlocks, NetworkPorts, Representatives, VersionPins,
    };

    fn genesis(tag: &str, private: bool) -> GenesisBlock {
        GenesisBlock {
            public_key: format!("{}_PUB", tag),
            private_key: private.then(|| format!("{}_PRIV", tag)),
            account: format!("xrb_{}", tag.to_lowercase()),
            work: "7b42a00ee91d5810".to_string(),
            signature: format!("{}_SIG", tag),
        }
    }

    fn reps(tag: &str, n: usize) -> Vec<RepresentativeKey> {
        (0..n)
            .map(|i| RepresentativeKey {
                public_key: format!("{}_REP_PUB_{}", tag, i),
                private_key: format!("{}_REP_PRIV_{}", tag, i),
            })
            .collect()
    }

    /// A fully populated configuration
    pub(crate) fn complete_settings(abbreviation: &str) -> ChainSettings {
        ChainSettings {
            abbreviation: abbreviation.to_string(),
            name: "Test chain".to_string(),
            genesis: GenesisBlocks {
                dev: genesis("DEV", true),
                beta: genesis("BETA", false),
                live: genesis("LIVE", false),
                test: genesis("TEST", false),
            },
            canary: CanaryKeys {
                beta: "CANARY_BETA".to_string(),
                live: "CANARY_LIVE".to_string(),
                test: "CANARY_TEST".to_string(),
            },
            faucet_public_key: "FAUCET".to_string(),
            landing_public_key: "LANDING".to_string(),
            representatives: Representatives {
                beta: reps("BETA", 2),
                live: reps("LIVE", 8),
            },
            ports: NetworkPorts {
                live: NodePorts { peering: 7075, rpc: 7076 },
                beta: NodePorts { peering: 54000, rpc: 55000 },
                test: NodePorts { peering: 17075, rpc: 17076 },
            },
            versions: VersionPins {
                node: "V23.3".to_string(),
                proxy: "1.4.0".to_string(),
                tools: "0.9.2".to_string(),
            },
            ..ChainSettings::default()
        }
    }

    fn chain(settings: ChainSettings) -> BlockChain {
        BlockChain::new(42, settings, "ops@example.com")
    }

    fn get<'a>(params: &'a ParameterSet, name: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_build_params_carry_configuration() {
        let encoder = ParameterEncoder::new("nano-fork");
        let params = encoder
            .encode(JobKind::Build, &chain(complete_settings("ABC")), 9)
            .unwrap();

        assert_eq!(get(&params, "ABBREVIATION"), Some("ABC"));
        assert_eq!(get(&params, "GENESIS_DEV_PRIVATE_KEY"), Some("DEV_PRIV"));
        assert_eq!(get(&params, "GENESIS_LIVE_PRIVATE_KEY"), None);
        assert_eq!(get(&params, "LIVE_PRE_CONF_REP_PRIVATE_KEY_7"), Some("LIVE_REP_PRIV_7"));
        assert_eq!(get(&params, "BETA_RPC_PORT"), Some("55000"));
        assert_eq!(get(&params, "ENABLE_CUSTOM_DOMAIN"), Some("false"));
        assert_eq!(get(&params, "NUMBER_OF_PEERS"), Some("2"));
        assert_eq!(get(&params, "S3_BUCKET_NAME"), Some("nano-fork-ABC"));
        assert_eq!(get(&params, CORRELATION_PARAM), Some("9"));
        assert_eq!(params.len(), 63);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = ParameterEncoder::new("nano-fork");
        let chain = chain(complete_settings("ABC"));
        let first = encoder.encode(JobKind::Build, &chain, 3).unwrap();
        let second = encoder.encode(JobKind::Build, &chain, 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bucket_name_prefers_explicit_value() {
        let encoder = ParameterEncoder::new("nano-fork");

        let mut settings = complete_settings("ABC");
        settings.s3_bucket_name = Some("my-bucket".to_string());
        assert_eq!(encoder.bucket_name(&chain(settings.clone())), "my-bucket");

        settings.s3_bucket_name = Some("None".to_string());
        assert_eq!(encoder.bucket_name(&chain(settings.clone())), "nano-fork-ABC");

        settings.s3_bucket_name = Some(String::new());
        assert_eq!(encoder.bucket_name(&chain(settings)), "nano-fork-ABC");
    }

    #[test]
    fn test_deploy_and_terminate_params() {
        let encoder = ParameterEncoder::new("nano-fork");
        let chain = chain(complete_settings("ABC"));

        let deploy = encoder.encode(JobKind::Deploy, &chain, 11).unwrap();
        assert_eq!(
            deploy,
            vec![
                ("ABBREVIATION".to_string(), "ABC".to_string()),
                (CORRELATION_PARAM.to_string(), "11".to_string()),
            ]
        );

        let terminate = encoder.encode(JobKind::Terminate, &chain, 12).unwrap();
        assert_eq!(get(&terminate, "BLOCKCHAIN_ID"), Some("42"));
        assert_eq!(get(&terminate, CORRELATION_PARAM), Some("12"));
        assert_eq!(terminate.len(), 3);
    }

    #[test]
    fn test_missing_fields_fail_with_field_name() {
        let encoder = ParameterEncoder::new("nano-fork");

        let mut settings = complete_settings("ABC");
        settings.genesis.beta.signature.clear();
        let err = encoder
            .encode(JobKind::Build, &chain(settings), 1)
            .unwrap_err();
        assert_eq!(err.field, "genesis_beta_signature");

        let mut settings = complete_settings("ABC");
        settings.ports.test.rpc = 0;
        let err = encoder
            .encode(JobKind::Build, &chain(settings), 1)
            .unwrap_err();
        assert_eq!(err.field, "test_rpc_port");

        let mut settings = complete_settings("ABC");
        settings.representatives.live.clear();
        let err = encoder
            .encode(JobKind::Build, &chain(settings), 1)
            .unwrap_err();
        assert_eq!(err.field, "live_pre_conf_rep_public_key_0");
    }

    #[test]
    fn test_deploy_only_needs_abbreviation() {
        let encoder = ParameterEncoder::new("nano-fork");
        let settings = ChainSettings {
            abbreviation: "ABC".to_string(),
            ..ChainSettings::default()
        };
        assert!(encoder.encode(JobKind::Deploy, &chain(settings.clone()), 1).is_ok());
        assert!(encoder.encode(JobKind::Build, &chain(settings), 1).is_err());
    }
}
