// Domain layer: entities, chain data types and ports (interfaces).

pub mod chain;
pub mod model;
pub mod ports;
