//! Geometric multigrid for the edge-discretized Maxwell operator
//!
//! Provides V-, W- and F-cycles over full or semicoarsened hierarchies,
//! block Gauss-Seidel smoothing (point or line), prolongation along
//! Yee-grid edges with its exact adjoint as restriction, and a direct
//! solve on the coarsest grid.

mod coarse;
mod cycle;
mod hierarchy;
mod smoother;
mod transfer;

pub use coarse::*;
pub use cycle::*;
pub use hierarchy::*;
pub use smoother::*;
pub use transfer::*;
