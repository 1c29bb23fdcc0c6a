//! Aggregation of every target site of a run.

use crate::errors::{AggregationError, SiteAggregationError};
use crate::kinds::TableKind;
use crate::merge::merge_tables;
use crate::tools::{
    hdr_plot_command, plot_command, report_command, spreadsheet_command, ToolRunner,
};
use amp_types::{ExternalCommand, SampleTargets, TargetSite};
use anyhow::Context;
use glob::Pattern;
use log::{debug, info, warn};
use parameters_toml::Tools;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where the per-sample outputs are and where the merged ones go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    /// Work directory of the per-sample jobs.
    pub align_dir: PathBuf,
    /// Parent of the per-site delivery folders.
    pub deliverables_dir: PathBuf,
}

impl SiteLayout {
    pub fn site_dir(&self, site: &str) -> PathBuf {
        self.deliverables_dir.join(site)
    }
}

#[derive(Debug, Default)]
pub struct AggregationSummary {
    /// Sites that aggregated cleanly.
    pub sites: Vec<String>,
    pub failures: Vec<SiteAggregationError>,
}

pub struct SiteAggregator<'a> {
    pub layout: &'a SiteLayout,
    pub tools: &'a Tools,
    /// Aggregate the alignment view tables.
    pub alignment_view: bool,
    pub runner: &'a dyn ToolRunner,
}

impl<'a> SiteAggregator<'a> {
    /// Table kinds aggregated for `site`.
    pub fn kinds_for(&self, site: &TargetSite) -> Vec<TableKind> {
        TableKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                TableKind::AlignmentView => self.alignment_view,
                TableKind::Hdr => site.has_hdr(),
                _ => true,
            })
            .collect()
    }

    /// Aggregate every site in name order. A failing site does not stop the
    /// others.
    pub fn aggregate_all(
        &self,
        sites: &BTreeMap<String, TargetSite>,
        relation: &SampleTargets,
    ) -> AggregationSummary {
        let mut summary = AggregationSummary::default();
        let site_names: Vec<&str> = sites.keys().map(String::as_str).collect();
        for (name, site) in sites {
            let samples: Vec<_> = relation.samples_for_site(name).collect();
            if samples.is_empty() {
                warn!("no sample targets site {name}, skipping it");
                continue;
            }
            match self.aggregate_site(site, &samples, &site_names) {
                Ok(()) => {
                    info!("aggregated {} sample(s) for site {name}", samples.len());
                    summary.sites.push(name.clone());
                }
                Err(source) => {
                    warn!("aggregating site {name} failed: {source}");
                    summary.failures.push(SiteAggregationError {
                        site: name.clone(),
                        source,
                    });
                }
            }
        }
        summary
    }

    /// Merge, plot and report one site. `samples` must be sorted.
    /// `site_names` are the names of every site of the run, used to tell the
    /// images of `site` from those of sites sharing its name as a prefix.
    pub fn aggregate_site(
        &self,
        site: &TargetSite,
        samples: &[&str],
        site_names: &[&str],
    ) -> Result<(), AggregationError> {
        let site_dir = self.layout.site_dir(&site.name);
        std::fs::create_dir_all(&site_dir)
            .with_context(|| format!("creating {}", site_dir.display()))?;

        for kind in self.kinds_for(site) {
            let inputs: Vec<_> = samples
                .iter()
                .map(|&s| (s, kind.sample_table(&self.layout.align_dir, s, &site.name)))
                .collect();
            let table = kind.site_table(&site_dir, &site.name);
            merge_tables(&inputs, &table)?;
            debug!("wrote {kind} table {}", table.display());

            if let Some(program) = kind.plot_program(&self.tools.plots) {
                let cmd = match kind {
                    TableKind::Hdr => {
                        hdr_plot_command(program, &table, &site.name, &site_dir, &site.hdr_string())
                    }
                    _ => plot_command(program, &table, &site.name, &site_dir),
                };
                self.invoke(&cmd)?;
            }
            if let Some(program) = non_empty(&self.tools.spreadsheet) {
                self.invoke(&spreadsheet_command(program, &table))?;
            }
        }

        self.move_images(&site.name, samples, site_names, &site_dir)?;

        if let Some(program) = non_empty(&self.tools.report) {
            self.invoke(&report_command(program, &site_dir, &site.name))?;
        }
        Ok(())
    }

    fn invoke(&self, cmd: &ExternalCommand) -> Result<(), AggregationError> {
        debug!("running {cmd}");
        let status = self.runner.run(cmd)?;
        if !status.success() {
            return Err(AggregationError::ToolFailed {
                command: cmd.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    /// Move `<sample>_<site>*.png` images of the site's samples into the
    /// site folder.
    fn move_images(
        &self,
        site: &str,
        samples: &[&str],
        site_names: &[&str],
        site_dir: &Path,
    ) -> anyhow::Result<()> {
        let align_dir = Pattern::escape(&self.layout.align_dir.to_string_lossy());
        for sample in samples {
            let prefix = format!("{sample}_{site}");
            let pattern = format!("{align_dir}/{}*.png", Pattern::escape(&prefix));
            for image in glob::glob(&pattern).with_context(|| pattern.clone())? {
                let image = image?;
                let Some(name) = image.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                    continue;
                };
                // `s1_siteA*` also matches the images of `siteAB` and `siteA_2`.
                if image_site(&name, sample, site_names) != Some(site) {
                    continue;
                }
                let dest = site_dir.join(&name);
                std::fs::rename(&image, &dest).with_context(|| {
                    format!("moving {} to {}", image.display(), dest.display())
                })?;
            }
        }
        Ok(())
    }
}

/// The longest site name `image` of `sample` is named after, if any.
fn image_site<'s>(image: &str, sample: &str, site_names: &[&'s str]) -> Option<&'s str> {
    let rest = image.strip_prefix(sample)?.strip_prefix('_')?;
    site_names
        .iter()
        .copied()
        .filter(|site| {
            rest.strip_prefix(site)
                .is_some_and(|tail| tail.starts_with(['.', '_']))
        })
        .max_by_key(|site| site.len())
}

fn non_empty(program: &Option<String>) -> Option<&str> {
    program.as_deref().filter(|p| !p.is_empty())
}
