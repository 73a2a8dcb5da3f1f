mod greedy;
mod non_sharp;
mod smart;

pub use greedy::GreedySharingPolicy;
pub use non_sharp::NonSharpSharingPolicy;
pub use smart::SmartSharingPolicy;
