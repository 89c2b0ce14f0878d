//! Crawl Scheduler: a closed code range crossed with a category fallback chain.
//!
//! Codes are visited in ascending order. For each code the categories are
//! tried in order until one yields an artifact or a cancelled record; the
//! configured delay is honoured after every attempt. There is no persisted
//! cursor: resume by starting a new plan at the next code.

use crate::config::{HarvestConfig, LicenseCategory, LicenseCode};
use crate::error::{AttemptError, HarvestError};
use crate::harvest::Harvester;
use crate::output::CrawlSummary;
use crate::progress::{CrawlProgressCallback, NoopProgressCallback};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What one crawl covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlPlan {
    pub start: LicenseCode,
    pub end: LicenseCode,
    pub categories: Vec<LicenseCategory>,
    pub delay: Duration,
}

impl CrawlPlan {
    /// Validate and build a plan over `start..=end`.
    pub fn new(
        start: u32,
        end: u32,
        categories: Vec<LicenseCategory>,
        delay: Duration,
    ) -> Result<Self, HarvestError> {
        let start = LicenseCode::new(start).ok_or_else(|| {
            HarvestError::InvalidConfig(format!("start code {start} is wider than six digits"))
        })?;
        let end = LicenseCode::new(end).ok_or_else(|| {
            HarvestError::InvalidConfig(format!("end code {end} is wider than six digits"))
        })?;
        if start > end {
            return Err(HarvestError::InvalidConfig(format!(
                "start code {start} is after end code {end}"
            )));
        }
        if categories.is_empty() {
            return Err(HarvestError::InvalidConfig(
                "a crawl needs at least one category".into(),
            ));
        }
        Ok(Self {
            start,
            end,
            categories,
            delay,
        })
    }

    /// A single code under a single category.
    pub fn single(code: LicenseCode, category: LicenseCategory, delay: Duration) -> Self {
        Self {
            start: code,
            end: code,
            categories: vec![category],
            delay,
        }
    }

    /// Range plan using the config's fallback chain unless `category` is given.
    pub fn for_config(
        config: &HarvestConfig,
        start: u32,
        end: u32,
        category: Option<LicenseCategory>,
    ) -> Result<Self, HarvestError> {
        let categories = match category {
            Some(c) => vec![c],
            None => config.fallback_categories.clone(),
        };
        Self::new(start, end, categories, config.request_delay())
    }

    pub fn codes(&self) -> impl Iterator<Item = LicenseCode> {
        (self.start.value()..=self.end.value()).filter_map(LicenseCode::new)
    }

    /// Number of codes in the range.
    pub fn code_count(&self) -> usize {
        (self.end.value() - self.start.value()) as usize + 1
    }
}

/// Run every code in `plan` through `harvester`.
///
/// Per-attempt failures are counted and logged, never returned.
pub async fn run_crawl(
    harvester: &mut Harvester,
    plan: &CrawlPlan,
    progress: Option<&dyn CrawlProgressCallback>,
) -> Result<CrawlSummary, HarvestError> {
    let progress = progress.unwrap_or(&NoopProgressCallback);
    let mut summary = CrawlSummary::default();

    info!(
        "Crawling {}..={} across {} categor{}",
        plan.start,
        plan.end,
        plan.categories.len(),
        if plan.categories.len() == 1 { "y" } else { "ies" }
    );
    progress.on_crawl_start(plan.code_count());

    for code in plan.codes() {
        summary.codes += 1;
        let code_str = code.to_string();
        let mut saved = false;

        for &category in &plan.categories {
            summary.attempts += 1;
            progress.on_attempt_start(&code_str, category.label());

            let outcome = harvester.harvest(code, category).await;
            pause(plan.delay).await;

            match outcome {
                Ok(artifact) => {
                    summary.saved += 1;
                    summary.artifacts.push(artifact.filename().to_string());
                    progress.on_artifact_saved(&code_str, category.label(), artifact.filename());
                    saved = true;
                    break;
                }
                Err(e) => {
                    record_failure(&mut summary, &e);
                    progress.on_attempt_failed(&code_str, category.label(), &e);
                    if e.is_terminal() {
                        break;
                    }
                }
            }
        }

        progress.on_code_complete(&code_str, saved);
    }

    info!(
        "Crawl finished: {} saved, {} cancelled, {} not found, {} failed ({} attempts over {} codes)",
        summary.saved,
        summary.cancelled,
        summary.not_found,
        summary.failed,
        summary.attempts,
        summary.codes
    );
    progress.on_crawl_complete(&summary);
    Ok(summary)
}

fn record_failure(summary: &mut CrawlSummary, e: &AttemptError) {
    match e {
        AttemptError::RecordNotFound { .. } => {
            summary.not_found += 1;
            debug!("{}", e);
        }
        AttemptError::RecordCancelled { .. } => {
            summary.cancelled += 1;
            info!("{}", e);
        }
        _ => {
            summary.failed += 1;
            warn!("{}", e);
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(n: usize) -> LicenseCategory {
        LicenseCategory::by_number(n).unwrap()
    }

    #[test]
    fn plan_rejects_reversed_range() {
        let err = CrawlPlan::new(10, 5, vec![cat(1)], Duration::ZERO).unwrap_err();
        assert!(matches!(err, HarvestError::InvalidConfig(_)));
    }

    #[test]
    fn plan_rejects_wide_codes_and_empty_categories() {
        assert!(CrawlPlan::new(0, 1_000_000, vec![cat(1)], Duration::ZERO).is_err());
        assert!(CrawlPlan::new(0, 1, vec![], Duration::ZERO).is_err());
    }

    #[test]
    fn plan_range_is_inclusive() {
        let plan = CrawlPlan::new(8, 11, vec![cat(1)], Duration::ZERO).unwrap();
        let codes: Vec<String> = plan.codes().map(|c| c.to_string()).collect();
        assert_eq!(codes, ["000008", "000009", "000010", "000011"]);
        assert_eq!(plan.code_count(), 4);
    }

    #[test]
    fn plan_for_config_uses_fallback_chain() {
        let config = HarvestConfig::default();
        let plan = CrawlPlan::for_config(&config, 1, 1, None).unwrap();
        assert_eq!(plan.categories, LicenseCategory::ALL[..4].to_vec());

        let pinned = CrawlPlan::for_config(&config, 1, 1, Some(cat(7))).unwrap();
        assert_eq!(pinned.categories, vec![cat(7)]);
    }

    #[test]
    fn failures_are_bucketed() {
        let mut summary = CrawlSummary::default();
        record_failure(&mut summary, &AttemptError::RecordNotFound { label: "a".into() });
        record_failure(
            &mut summary,
            &AttemptError::RecordCancelled {
                label: "a".into(),
                status: "已註銷".into(),
            },
        );
        record_failure(&mut summary, &AttemptError::NoRenditionFound { label: "a".into() });
        assert_eq!((summary.not_found, summary.cancelled, summary.failed), (1, 1, 1));
    }
}
