//! refjanitor: citation cleanup for wiki pages
//!
//! - merge: name duplicate `<ref>`s
//! - upgrade: turn bare URLs into citation templates
//! - pipeline: both passes plus an edit-comment manifest
//! - wiki / bot: page storage collaborators and the bot loop

pub mod bot;
pub mod cite;
pub mod config;
pub mod error;
pub mod markup;
pub mod merge;
pub mod pipeline;
pub mod title;
pub mod upgrade;
pub mod wiki;

pub use cite::{Citation, CitationKind, CitationSynthesizer};
pub use error::{Error, SaveError};
pub use merge::{merge_duplicates, MergeOutcome};
pub use pipeline::{ChangeAction, ChangeManifest, Pipeline, Transformation};
pub use title::{HttpTitleResolver, ResolvedTitle, TitleResolver};
pub use upgrade::{BareUrlUpgrader, SeenUrls, UpgradeOutcome};
