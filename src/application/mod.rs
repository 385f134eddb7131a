mod poller;
mod series;

pub use poller::Poller;
