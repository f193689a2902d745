mod desc;
pub use desc::*;
pub use oct_inl_ipsec_generator_macros::*;
