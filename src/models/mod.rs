pub mod forecast;
pub mod rule;
pub mod season;
pub mod state;

pub use forecast::*;
pub use rule::*;
pub use season::*;
pub use state::*;
