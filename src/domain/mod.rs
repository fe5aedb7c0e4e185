mod account;
mod integrity;
mod invoice;
mod journal;
mod ledger;
mod money;
mod period;

pub use account::*;
pub use integrity::*;
pub use invoice::*;
pub use journal::*;
pub use ledger::*;
pub use money::*;
pub use period::*;
