pub mod eastmoney_search;
pub mod fundgz;
pub mod util;

pub use eastmoney_search::EastmoneySearchProvider;
pub use fundgz::FundgzProvider;
