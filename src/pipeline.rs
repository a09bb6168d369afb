//! Transformation pipeline: merge duplicates, then upgrade bare URLs
//!
//! The order is fixed. The merger only sees references that were already
//! textual duplicates in the input; URLs expanded by the upgrader are never
//! merged in the same run.

use crate::markup::{Markup, PatternMarkup};
use crate::merge::merge_duplicates_with;
use crate::title::TitleResolver;
use crate::upgrade::BareUrlUpgrader;
use serde::Serialize;

pub const DEFAULT_SUMMARY_PREFIX: &str = "Bot: ";

/// One kind of change a pass can make
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeAction {
    #[serde(rename = "named duplicate references")]
    NamedDuplicateRefs,
    #[serde(rename = "converted bare refs to cite web")]
    ConvertedBareRefs,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::NamedDuplicateRefs => write!(f, "named duplicate references"),
            ChangeAction::ConvertedBareRefs => write!(f, "converted bare refs to cite web"),
        }
    }
}

/// Ordered record of what a pipeline run changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeManifest {
    actions: Vec<ChangeAction>,
}

impl ChangeManifest {
    pub fn record(&mut self, action: ChangeAction) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[ChangeAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Edit comment, e.g. `Bot: named duplicate references; converted bare refs to cite web`
    pub fn summary(&self, prefix: &str) -> String {
        let tags: Vec<String> = self.actions.iter().map(|a| a.to_string()).collect();
        format!("{}{}", prefix, tags.join("; "))
    }
}

/// Output of [`Pipeline::transform`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformation {
    pub text: String,
    pub changed: bool,
    pub manifest: ChangeManifest,
    /// Reference names assigned by the merger
    pub named: Vec<String>,
    /// URLs the upgrader replaced
    pub upgraded: Vec<String>,
    pub marker_removed: bool,
}

pub struct Pipeline<R, M = PatternMarkup> {
    upgrader: BareUrlUpgrader<R, M>,
}

impl<R: TitleResolver, M: Markup> Pipeline<R, M> {
    pub fn new(upgrader: BareUrlUpgrader<R, M>) -> Self {
        Self { upgrader }
    }

    pub fn upgrader(&self) -> &BareUrlUpgrader<R, M> {
        &self.upgrader
    }

    pub async fn transform(&self, text: &str) -> Transformation {
        let mut manifest = ChangeManifest::default();

        let merged = merge_duplicates_with(self.upgrader.markup(), text);
        if merged.changed {
            manifest.record(ChangeAction::NamedDuplicateRefs);
        }

        let upgraded = self.upgrader.upgrade_bare_urls(&merged.text).await;
        if upgraded.changed {
            manifest.record(ChangeAction::ConvertedBareRefs);
        }

        Transformation {
            text: upgraded.text,
            changed: merged.changed || upgraded.changed,
            manifest,
            named: merged.named,
            upgraded: upgraded.upgraded,
            marker_removed: upgraded.marker_removed,
        }
    }
}
