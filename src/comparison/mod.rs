// Before/after comparison of measurement sets
//
// The significance test itself belongs to an external `Comparator`. This module
// fixes the comparator's configuration and post-filters its tables so that
// only statistically changed rows survive.

mod command;
mod filter;
mod table;

pub use command::CommandComparator;
pub use filter::ChangeFilter;
pub use table::{
    Comparator, ComparatorConfig, ComparisonRow, ComparisonTable, DeltaTest, UNCHANGED,
};
