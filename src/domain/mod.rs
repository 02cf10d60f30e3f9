// Domain layer: core models and ports (interfaces). No storage or transport details here.

pub mod model;
pub mod ports;
