pub mod account;
pub mod item;
pub mod loaders;
pub mod outcome;

pub use account::{query_label, Account, AccountsFile, Credentials};
pub use item::{ApplicationRecord, ItemId, ItemMeta, TestRequiredRecord};
pub use loaders::{load_accounts, parse_accounts};
pub use outcome::{Outcome, OutcomeKind, RawResult, SessionCounters};
