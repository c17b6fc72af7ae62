mod coupling;
mod options;
mod site;
mod state;

pub use coupling::{
    split_bilinear, split_biquadratic, BilinearCoupling, BiquadraticCoupling, DirectedBiquadratic,
    DirectedExchange,
};
pub use options::{CalculationOptions, CancelToken, HamiltonianFallback, SortMode};
pub use site::{Site, IDENTITY_3X3};
pub use state::{Commensurability, MagneticField, MagneticState, Twin};
