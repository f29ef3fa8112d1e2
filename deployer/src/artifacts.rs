//! Resolution of contract names to deployable bytecode and ABI
//!
//! Artifacts are produced by an external compiler toolchain; the deployer only
//! reads them and encodes constructor / function arguments against their ABI.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{JsonAbi, Param},
    primitives::Bytes,
};
use itertools::Itertools;
use serde::Deserialize;

use crate::{
    constants::JSON_EXTENSION,
    errors::DeployError,
};

/// A compiled contract
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Artifact {
    /// The contract name as emitted by the compiler
    #[serde(rename = "contractName")]
    pub contract_name: String,
    /// The contract ABI
    pub abi: JsonAbi,
    /// The creation bytecode
    pub bytecode: Bytes,
}

impl Artifact {
    /// The init code deploying this contract with the given constructor arguments
    pub fn deploy_code(&self, args: &[String]) -> Result<Bytes, DeployError> {
        let encoded_args = match &self.abi.constructor {
            Some(constructor) => {
                let values = coerce_args(&constructor.inputs, args)?;
                constructor.abi_encode_input(&values).map_err(|e| {
                    DeployError::Calldata(format!("{} constructor: {e}", self.contract_name))
                })?
            }
            None if args.is_empty() => Vec::new(),
            None => {
                return Err(DeployError::Calldata(format!(
                    "{} has no constructor but {} arguments were given",
                    self.contract_name,
                    args.len()
                )))
            }
        };

        Ok([self.bytecode.as_ref(), encoded_args.as_slice()].concat().into())
    }

    /// Calldata invoking `function` with the given arguments, choosing the
    /// overload whose arity matches
    pub fn encode_call(&self, function: &str, args: &[String]) -> Result<Bytes, DeployError> {
        let overload = self
            .abi
            .function(function)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == args.len()))
            .ok_or_else(|| {
                DeployError::Calldata(format!(
                    "{} has no function {function} taking {} arguments",
                    self.contract_name,
                    args.len()
                ))
            })?;

        let values = coerce_args(&overload.inputs, args)?;
        overload
            .abi_encode_input(&values)
            .map(Bytes::from)
            .map_err(|e| DeployError::Calldata(format!("{}.{function}: {e}", self.contract_name)))
    }
}

/// Coerce textual arguments to the given ABI parameter types
pub fn coerce_args(params: &[Param], args: &[String]) -> Result<Vec<DynSolValue>, DeployError> {
    if params.len() != args.len() {
        return Err(DeployError::Calldata(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty: DynSolType = param
                .resolve()
                .map_err(|e| DeployError::Calldata(format!("{}: {e}", param.ty)))?;
            ty.coerce_str(arg).map_err(|e| {
                let msg = format!("cannot use {arg:?} as {} {}: {e}", param.ty, param.name);
                DeployError::Calldata(msg)
            })
        })
        .collect()
}

/// Resolves contract names to artifacts
pub trait ArtifactStore: Send + Sync {
    /// The artifact of the given contract
    fn resolve(&self, name: &str) -> Result<Artifact, DeployError>;
}

// -----------
// | Hardhat |
// -----------

/// Reads artifacts from a Hardhat `artifacts/` tree, or from a flat directory
/// of `<Name>.json` artifacts
#[derive(Clone, Debug)]
pub struct HardhatArtifacts {
    /// The artifacts root
    root: PathBuf,
}

impl HardhatArtifacts {
    /// Constructor
    pub fn new(root: impl Into<PathBuf>) -> Self {
        HardhatArtifacts { root: root.into() }
    }

    /// Find the artifact file of the given contract under the root
    fn find(&self, name: &str) -> Result<PathBuf, DeployError> {
        let file_name = format!("{name}.{JSON_EXTENSION}");
        let matches = find_files(&self.root, &file_name)?;

        match matches.as_slice() {
            [path] => Ok(path.clone()),
            [] => Err(DeployError::Artifact(format!(
                "no artifact for {name} under {}",
                self.root.display()
            ))),
            _ => Err(DeployError::Artifact(format!(
                "ambiguous artifact for {name}: {}",
                matches.iter().map(|p| p.display()).join(", ")
            ))),
        }
    }
}

impl ArtifactStore for HardhatArtifacts {
    fn resolve(&self, name: &str) -> Result<Artifact, DeployError> {
        let path = self.find(name)?;
        let contents = fs::read_to_string(&path)
            .map_err(|e| DeployError::Io(format!("{}: {e}", path.display())))?;

        serde_json::from_str(&contents)
            .map_err(|e| DeployError::Artifact(format!("{}: {e}", path.display())))
    }
}

/// Recursively collect files with the given name
///
/// Hardhat's `<Name>.dbg.json` companions never match, since names are compared exactly.
fn find_files(dir: &Path, file_name: &str) -> Result<Vec<PathBuf>, DeployError> {
    let entries =
        fs::read_dir(dir).map_err(|e| DeployError::Io(format!("{}: {e}", dir.display())))?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| DeployError::Io(format!("{}: {e}", dir.display())))?
            .path();
        if path.is_dir() {
            found.extend(find_files(&path, file_name)?);
        } else if path.file_name().is_some_and(|f| f == file_name) {
            found.push(path);
        }
    }

    Ok(found)
}

/// An in-memory artifact store
#[derive(Clone, Debug, Default)]
pub struct MemoryArtifacts {
    /// Artifacts keyed by contract name
    artifacts: BTreeMap<String, Artifact>,
}

impl MemoryArtifacts {
    /// Add an artifact, keyed by its contract name
    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts.insert(artifact.contract_name.clone(), artifact);
    }
}

impl ArtifactStore for MemoryArtifacts {
    fn resolve(&self, name: &str) -> Result<Artifact, DeployError> {
        self.artifacts
            .get(name)
            .cloned()
            .ok_or_else(|| DeployError::Artifact(format!("no artifact for {name}")))
    }
}
