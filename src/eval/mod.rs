pub mod value_net;

pub use value_net::ValueNet;
