mod cancel;
mod environment;
mod error;
mod inventory;
mod label;
mod mirror;
mod outcome;
mod package;

pub use cancel::CancelToken;
pub use environment::{Environment, FALLBACK_LABEL};
pub use error::{CoreError, FailureCategory};
pub use inventory::Inventory;
pub use label::{compare_labels, sort_by_label_descending};
pub use mirror::{
    builtin_mirrors, validate_index_url, validate_mirror_name, MirrorConfig, DEFAULT_INDEX_URL,
    DEFAULT_MIRROR_NAME,
};
pub use outcome::{Action, Operation, OperationResult, Outcome, RefreshStatus, TerminalState};
pub use package::{
    normalize_package_name, same_package, validate_package_name, OutdatedRecord, PackageRecord,
};
