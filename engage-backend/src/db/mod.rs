mod sqlite;
mod tables;

pub use sqlite::Database;
pub use tables::contacts::ContactUpsert;
pub use tables::campaigns::StartCampaignOutcome;

#[cfg(test)]
pub(crate) use sqlite::test_support;
