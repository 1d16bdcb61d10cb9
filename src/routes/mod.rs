pub mod tally;
pub mod util;
