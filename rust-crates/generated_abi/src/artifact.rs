use std::{
    fs,
    path::Path,
};

use ethers::{
    abi::Abi,
    types::Bytes,
};
use serde::Deserialize;

use crate::{
    REQUIRED_FUNCTIONS,
    ROLL_EVENT,
};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("artifact is not valid Hardhat JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("artifact has no deployable bytecode")]
    EmptyBytecode,
    #[error("artifact ABI is missing {0}")]
    Incompatible(String),
}

/// Compiled contract as emitted by `hardhat compile` under
/// `artifacts/contracts/<Name>.sol/<Name>.json`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouletteArtifact {
    #[serde(default)]
    pub contract_name: Option<String>,
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl RouletteArtifact {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, ArtifactError> {
        let artifact: RouletteArtifact = serde_json::from_slice(raw)?;
        if artifact.bytecode.is_empty() {
            return Err(ArtifactError::EmptyBytecode);
        }
        artifact.check_compatible()?;
        Ok(artifact)
    }

    pub fn check_compatible(&self) -> Result<(), ArtifactError> {
        abi_is_compatible(&self.abi)
    }
}

pub fn abi_is_compatible(abi: &Abi) -> Result<(), ArtifactError> {
    for name in REQUIRED_FUNCTIONS {
        if abi.function(name).is_err() {
            return Err(ArtifactError::Incompatible(format!("function `{name}`")));
        }
    }
    if abi.event(ROLL_EVENT).is_err() {
        return Err(ArtifactError::Incompatible(format!("event `{ROLL_EVENT}`")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn artifact_json(functions: &[&str], bytecode: &str) -> String {
        let mut entries: Vec<String> = functions
            .iter()
            .map(|name| {
                format!(
                    r#"{{"type":"function","name":"{name}","inputs":[],"outputs":[],"stateMutability":"nonpayable"}}"#
                )
            })
            .collect();
        entries.push(
            r#"{"type":"event","name":"Roll","anonymous":false,"inputs":[{"name":"player","type":"address","indexed":true}]}"#
                .to_string(),
        );
        format!(
            r#"{{"contractName":"Roulette","abi":[{}],"bytecode":"{bytecode}"}}"#,
            entries.join(",")
        )
    }

    #[test]
    fn from_json__accepts_complete_artifact() {
        // given
        let json = artifact_json(&REQUIRED_FUNCTIONS, "0x6080");

        // when
        let artifact = RouletteArtifact::from_json(json.as_bytes()).unwrap();

        // then
        assert_eq!(artifact.contract_name.as_deref(), Some("Roulette"));
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x80]);
    }

    #[test]
    fn from_json__rejects_missing_function() {
        // given
        let json = artifact_json(&["owner", "getGameState"], "0x6080");

        // when
        let err = RouletteArtifact::from_json(json.as_bytes()).unwrap_err();

        // then
        assert!(matches!(err, ArtifactError::Incompatible(name) if name.contains("deposit")));
    }

    #[test]
    fn from_json__rejects_empty_bytecode() {
        let json = artifact_json(&REQUIRED_FUNCTIONS, "0x");
        let err = RouletteArtifact::from_json(json.as_bytes()).unwrap_err();
        assert!(matches!(err, ArtifactError::EmptyBytecode));
    }
}
