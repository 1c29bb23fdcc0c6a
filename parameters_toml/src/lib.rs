// Warning groups (as of rust 1.55)
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2021_compatibility,
    rust_2018_idioms,
    unused
)]
// Other warnings (as of rust 1.55)
#![deny(
    asm_sub_register,
    bad_asm_style,
    bindings_with_variant_name,
    clashing_extern_declarations,
    confusable_idents,
    const_item_mutation,
    deprecated,
    deref_nullptr,
    drop_bounds,
    dyn_drop,
    elided_lifetimes_in_paths,
    exported_private_dependencies,
    function_item_references,
    improper_ctypes,
    improper_ctypes_definitions,
    incomplete_features,
    inline_no_sanitize,
    invalid_value,
    irrefutable_let_patterns,
    large_assignments,
    mixed_script_confusables,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overlapping_range_endpoints,
    renamed_and_removed_lints,
    stable_features,
    dangling_pointers_from_temporaries,
    trivial_bounds,
    type_alias_bounds,
    uncommon_codepoints,
    unconditional_recursion,
    unknown_lints,
    unnameable_test_items,
    unused_comparisons,
    while_true
)]

//! Tunable run parameters, read from `parameters.toml`.

use anyhow::{bail, Context, Result};
use log::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the parameters file looked up next to the running executable.
pub const PARAMETERS_FILE: &str = "parameters.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Polling {
    /// Time between two scans of the marker files.
    pub interval_secs: u64,
    /// Give up on unfinished samples after this long.
    pub timeout_secs: u64,
    /// How long the cluster watchdog waits for a log file to appear once the
    /// queue reports none of the run's jobs.
    pub watchdog_grace_secs: u64,
}

impl Default for Polling {
    fn default() -> Self {
        Polling {
            interval_secs: 120,
            timeout_secs: 2 * 24 * 60 * 60,
            watchdog_grace_secs: 360,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Cluster {
    /// Cores reserved for each sample job. Kept small so that many samples
    /// submitted at once do not oversubscribe a shared cluster.
    pub cores: usize,
    /// Parallel environment used for the core reservation.
    pub parallel_environment: String,
    /// Submission program; reads the job script from stdin.
    pub submit_program: String,
    /// Program listing live jobs as XML.
    pub status_program: String,
    /// Program deleting jobs by name.
    pub delete_program: String,
    /// Queue to submit to, if not the cluster default.
    pub queue: Option<String>,
    /// Prefix of the job names of a run.
    pub job_prefix: String,
}

impl Default for Cluster {
    fn default() -> Self {
        Cluster {
            cores: 2,
            parallel_environment: "smp".to_string(),
            submit_program: "qsub".to_string(),
            status_program: "qstat".to_string(),
            delete_program: "qdel".to_string(),
            queue: None,
            job_prefix: "amp".to_string(),
        }
    }
}

/// Plotting program for each merged table kind. An empty string disables
/// plotting of that kind.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Plots {
    pub read_count: Option<String>,
    pub chromosome: Option<String>,
    pub snp: Option<String>,
    pub indel: Option<String>,
    pub length: Option<String>,
    pub alignment_view: Option<String>,
    pub hdr: Option<String>,
}

impl Default for Plots {
    fn default() -> Self {
        Plots {
            read_count: Some("amp-plot-read-count".to_string()),
            chromosome: Some("amp-plot-chromosome".to_string()),
            snp: Some("amp-plot-snp".to_string()),
            indel: Some("amp-plot-indel".to_string()),
            length: Some("amp-plot-length".to_string()),
            alignment_view: Some("amp-plot-alignment".to_string()),
            hdr: Some("amp-plot-hdr".to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Tools {
    /// Per-sample worker program.
    pub worker: String,
    /// Per-site report generator.
    pub report: Option<String>,
    /// Table to spreadsheet converter.
    pub spreadsheet: Option<String>,
    pub plots: Plots,
}

impl Default for Tools {
    fn default() -> Self {
        Tools {
            worker: "amp-sample".to_string(),
            report: Some("amp-report".to_string()),
            spreadsheet: None,
            plots: Plots::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Parameters {
    pub polling: Polling,
    pub cluster: Cluster,
    pub tools: Tools,
    /// Accepted suffixes of input FASTQ files.
    pub fastq_suffixes: Vec<String>,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            polling: Polling::default(),
            cluster: Cluster::default(),
            tools: Tools::default(),
            fastq_suffixes: vec![".gz".to_string()],
        }
    }
}

macro_rules! warn_non_default {
    ($params:expr, $default:expr, $($section:ident . $field:ident),+ $(,)?) => {
        $(
            if $params.$section.$field != $default.$section.$field {
                warn!(
                    "using non-default {}.{} = {:?}",
                    stringify!($section),
                    stringify!($field),
                    $params.$section.$field
                );
            }
        )+
    };
}

impl Parameters {
    /// Load the parameters.
    ///
    /// An explicit `path` must exist. Without one, `parameters.toml` next to
    /// the running executable is used if present, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Parameters> {
        let path = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("The parameters file {} does not exist.", path.display());
                }
                path.to_path_buf()
            }
            None => match default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    warn!("could not find {PARAMETERS_FILE}, falling back to defaults");
                    return Ok(Parameters::default());
                }
            },
        };
        let s = std::fs::read_to_string(&path).with_context(|| path.display().to_string())?;
        Parameters::from_toml(&s).with_context(|| path.display().to_string())
    }

    pub fn from_toml(s: &str) -> Result<Parameters> {
        let params: Parameters = toml::from_str(s)?;
        params.validate()?;
        params.warn_overrides();
        Ok(params)
    }

    fn validate(&self) -> Result<()> {
        if self.cluster.cores == 0 {
            bail!("cluster.cores must be at least 1");
        }
        if self.polling.interval_secs == 0 && self.polling.timeout_secs == 0 {
            bail!("polling.interval_secs and polling.timeout_secs cannot both be 0");
        }
        if self.fastq_suffixes.is_empty() {
            bail!("fastq_suffixes must list at least one suffix");
        }
        Ok(())
    }

    fn warn_overrides(&self) {
        let default = Parameters::default();
        warn_non_default!(
            self,
            default,
            polling.interval_secs,
            polling.timeout_secs,
            polling.watchdog_grace_secs,
            cluster.cores,
            cluster.parallel_environment,
            cluster.submit_program,
            cluster.status_program,
            cluster.delete_program,
            cluster.queue,
            cluster.job_prefix,
            tools.worker,
            tools.report,
            tools.spreadsheet,
            tools.plots,
        );
        if self.fastq_suffixes != default.fastq_suffixes {
            warn!("using non-default fastq_suffixes = {:?}", self.fastq_suffixes);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.polling.timeout_secs)
    }

    pub fn watchdog_grace(&self) -> Duration {
        Duration::from_secs(self.polling.watchdog_grace_secs)
    }
}

fn default_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .map(|exe| exe.with_file_name(PARAMETERS_FILE))
}
