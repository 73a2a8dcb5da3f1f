mod first;
mod random;
mod smart;

pub use first::FirstHostsPolicy;
pub use random::RandomHostsPolicy;
pub use smart::SmartHostsPolicy;
