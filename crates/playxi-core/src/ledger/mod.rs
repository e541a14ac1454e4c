// Sequential lineup ledger: match ordering, baselines and transfer accounting.

pub mod baseline;
pub mod timeline;
pub mod transfer;
