//! Coverage for the contracts of a solc standard JSON output.

use std::collections::{BTreeMap, BTreeSet};

use eyre::{eyre, Result, WrapErr};
use foundry_compilers::artifacts::{ContractDefinition, SourceUnit};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::ast::contracts;
use crate::{
    analysis::{
        candidates::SourceCandidates,
        coverage::{BranchMap, ContractSources, CoverageAnalysis, PcMap, StatementMap},
    },
    config::CoverageConfig,
    error::{CoverageError, Diagnostic},
};

/// The parts of solc's standard JSON output needed for coverage.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CompilerOutput {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceOutput>,
    #[serde(default)]
    pub contracts: BTreeMap<String, BTreeMap<String, ContractOutput>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SourceOutput {
    pub id: usize,
    pub ast: SourceUnit,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContractOutput {
    pub evm: Option<EvmOutput>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmOutput {
    pub deployed_bytecode: Option<BytecodeOutput>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BytecodeOutput {
    #[serde(default)]
    pub opcodes: String,
    #[serde(default)]
    pub source_map: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CoverageMap {
    pub statements: StatementMap,
    pub branches: BranchMap,
}

/// Coverage data of one contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCoverage {
    pub contract_name: String,
    pub source_path: String,
    /// The contract's own file and the files of all its dependencies.
    pub all_source_paths: Vec<String>,
    /// Names of inherited and otherwise referenced contracts.
    pub dependencies: Vec<String>,
    pub coverage_map: CoverageMap,
    pub pc_map: PcMap,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds [`ContractCoverage`] for the contracts of one compiler run.
///
/// Candidates are extracted once and shared by all contracts.
#[derive(Debug)]
pub struct CoverageBuilder {
    output: CompilerOutput,
    config: CoverageConfig,
    candidates: SourceCandidates,
}

impl CoverageBuilder {
    pub fn new(output: CompilerOutput, config: CoverageConfig) -> Result<Self> {
        let candidates =
            SourceCandidates::extract(output.sources.values().map(|source| &source.ast), &config)?;
        Ok(Self { output, config, candidates })
    }

    pub fn from_json(json: &str, config: CoverageConfig) -> Result<Self> {
        let output = serde_json::from_str(json).wrap_err("invalid compiler output")?;
        Self::new(output, config)
    }

    /// Coverage of every contract, ordered by source path and contract name.
    pub fn build(&self) -> Result<Vec<ContractCoverage>> {
        let contracts: Vec<(&str, &str)> = self
            .output
            .contracts
            .iter()
            .flat_map(|(path, contracts)| {
                contracts.keys().map(move |name| (path.as_str(), name.as_str()))
            })
            .collect();
        debug!(contracts = contracts.len(), "building coverage maps");

        #[cfg(feature = "parallel")]
        let iter = contracts.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = contracts.iter();

        iter.map(|(path, name)| self.build_at(path, name)).collect()
    }

    /// Coverage of one contract, given as `Name` or `path:Name`.
    pub fn build_contract(&self, contract: &str) -> Result<ContractCoverage> {
        let (path, name) = match contract.rsplit_once(':') {
            Some((path, name)) => (path.to_string(), name),
            None => {
                let mut paths = self
                    .output
                    .contracts
                    .iter()
                    .filter(|(_, contracts)| contracts.contains_key(contract))
                    .map(|(path, _)| path);
                let path = paths
                    .next()
                    .ok_or_else(|| CoverageError::UnknownContract(contract.to_string()))?;
                if let Some(other) = paths.next() {
                    return Err(eyre!(
                        "contract name `{contract}` is ambiguous: found in {path} and {other}"
                    ));
                }
                (path.clone(), contract)
            }
        };

        self.build_at(&path, name)
    }

    fn build_at(&self, path: &str, name: &str) -> Result<ContractCoverage> {
        let unknown = || CoverageError::UnknownContract(format!("{path}:{name}"));
        let contract =
            self.output.contracts.get(path).and_then(|c| c.get(name)).ok_or_else(unknown)?;
        let definition = self
            .output
            .sources
            .get(path)
            .and_then(|source| contracts(&source.ast).find(|c| c.name == name))
            .ok_or_else(unknown)?;

        let (dependencies, all_source_paths) = self.dependencies_of(definition, path);
        trace!(path, name, ?dependencies, "resolved contract dependencies");

        let mut sources = ContractSources::new();
        for (source_path, source) in &self.output.sources {
            if !self.config.restrict_to_dependencies || all_source_paths.contains(source_path) {
                sources.insert(source.id, &source.ast);
            }
        }

        let bytecode = contract.evm.as_ref().and_then(|evm| evm.deployed_bytecode.as_ref());
        let (opcodes, source_map) = bytecode
            .map(|bytecode| (bytecode.opcodes.as_str(), bytecode.source_map.as_str()))
            .unwrap_or_default();

        let maps =
            CoverageAnalysis::analyze(source_map, opcodes, &sources, &self.candidates, &self.config)
                .wrap_err_with(|| format!("failed to build coverage maps for {path}:{name}"))?;

        Ok(ContractCoverage {
            contract_name: name.to_string(),
            source_path: path.to_string(),
            all_source_paths,
            dependencies,
            coverage_map: CoverageMap { statements: maps.statements, branches: maps.branches },
            pc_map: maps.pc_map,
            diagnostics: maps.diagnostics,
        })
    }

    /// Names of every contract `definition` depends on, transitively, and the sorted source
    /// paths of the contract and those dependencies.
    fn dependencies_of(
        &self,
        definition: &ContractDefinition,
        path: &str,
    ) -> (Vec<String>, Vec<String>) {
        let definitions: BTreeMap<usize, (&str, &ContractDefinition)> = self
            .output
            .sources
            .iter()
            .flat_map(|(path, source)| {
                contracts(&source.ast)
                    .map(move |contract| (contract.id, (path.as_str(), contract)))
            })
            .collect();

        let mut names = BTreeSet::new();
        let mut paths = BTreeSet::from([path.to_string()]);
        let mut seen = BTreeSet::from([definition.id]);
        let mut queue = vec![definition];
        while let Some(current) = queue.pop() {
            let referenced =
                current.linearized_base_contracts.iter().chain(&current.contract_dependencies);
            for id in referenced {
                if !seen.insert(*id) {
                    continue;
                }
                let Some((path, dependency)) = definitions.get(id) else {
                    warn!(id, contract = %definition.name, "unknown dependency");
                    continue;
                };
                names.insert(dependency.name.clone());
                paths.insert(path.to_string());
                queue.push(dependency);
            }
        }

        (names.into_iter().collect(), paths.into_iter().collect())
    }
}
