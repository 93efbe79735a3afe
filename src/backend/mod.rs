pub mod oelo;
