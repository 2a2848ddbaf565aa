//! local_optimizer::builders — solver construction helpers.
//!
//! Purpose
//! -------
//! Provide small, focused builders for the two solver families used by the
//! refinement engine: L-BFGS (Hager–Zhang or More–Thuente line search) and
//! Nelder–Mead. These helpers hide Argmin's generic wiring and apply
//! crate-level options so that strategies can request a configured solver
//! without touching Argmin-specific types.
//!
//! Key behaviors
//! -------------
//! - Construct L-BFGS solvers and apply the gradient-norm and cost-change
//!   tolerances from [`RefineOptions`] via [`configure_lbfgs`].
//! - Construct a Nelder–Mead solver around the start point using the
//!   per-coordinate initial simplex from [`initial_simplex`], with the
//!   simplex spread tolerance taken from `f_tol`.
//!
//! Invariants & assumptions
//! ------------------------
//! - The L-BFGS memory (`m`) is either `opts.lbfgs_mem` or
//!   [`DEFAULT_LBFGS_MEM`].
//! - Invalid tolerances rejected by Argmin surface as `RefineError`
//!   through the crate's `From<Error>` conversion.
//!
//! Conventions
//! -----------
//! - Builders do **not** set the initial parameter or `max_iters`; the
//!   runner applies those when configuring the executor.
//!
//! Testing notes
//! -------------
//! - Unit tests cover memory propagation, tolerance wiring and the shape of
//!   the initial simplex. Full solves are exercised by the strategy tests.
use argmin::solver::quasinewton::LBFGS;

use crate::refinement::{
    errors::RefineResult,
    local_optimizer::{
        traits::RefineOptions,
        types::{
            Cost, DEFAULT_LBFGS_MEM, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente,
            MoreThuenteLS, Point, Simplex, ZERO_COORD_SIMPLEX_STEP,
        },
        validation::validate_start_point,
    },
};

/// build_optimizer_hager_zhang — construct L-BFGS with Hager–Zhang line search.
///
/// Parameters
/// ----------
/// - `opts`: `&RefineOptions`
///   Consults `opts.lbfgs_mem` (history size, default
///   [`DEFAULT_LBFGS_MEM`]) and `opts.tols.g_tol` / `opts.tols.f_tol`.
///
/// Returns
/// -------
/// `RefineResult<LbfgsHagerZhang>`
///
/// Errors
/// ------
/// - `RefineError` (via `From<argmin::core::Error>`) when Argmin rejects a
///   tolerance.
pub fn build_optimizer_hager_zhang(opts: &RefineOptions) -> RefineResult<LbfgsHagerZhang> {
    let hager_zhang = HagerZhangLS::new();
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsHagerZhang::new(hager_zhang, mem);
    configure_lbfgs(lbfgs, opts)
}

/// build_optimizer_more_thuente — construct L-BFGS with More–Thuente line search.
///
/// Same contract as [`build_optimizer_hager_zhang`] with [`MoreThuenteLS`]
/// as the line search.
pub fn build_optimizer_more_thuente(opts: &RefineOptions) -> RefineResult<LbfgsMoreThuente> {
    let more_thuente = MoreThuenteLS::new();
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsMoreThuente::new(more_thuente, mem);
    configure_lbfgs(lbfgs, opts)
}

/// configure_lbfgs — apply optional tolerances to an L-BFGS solver.
///
/// When a tolerance is `None`, the corresponding `with_tolerance_*` method
/// is not called and Argmin's default stays in effect.
///
/// # Errors
/// `RefineError` (via `From<argmin::core::Error>`) for rejected tolerances.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Point, Grad, Cost>, opts: &RefineOptions,
) -> RefineResult<LBFGS<L, Point, Grad, Cost>> {
    if let Some(g) = opts.tols.g_tol {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.f_tol {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}

/// build_simplex — construct a Nelder–Mead solver around `x0`.
///
/// Parameters
/// ----------
/// - `x0`: start point; must be non-empty and finite.
/// - `opts`: consults `opts.simplex_scale` and `opts.tols.f_tol` (spread
///   tolerance of the simplex values).
///
/// Errors
/// ------
/// - `RefineError::EmptyStartPoint` / `RefineError::InvalidStartPoint`.
/// - `RefineError` (via `From<argmin::core::Error>`) if Argmin rejects the
///   spread tolerance.
pub fn build_simplex(x0: &Point, opts: &RefineOptions) -> RefineResult<Simplex> {
    validate_start_point(x0)?;
    let mut solver = Simplex::new(initial_simplex(x0, opts.simplex_scale));
    if let Some(f_tol) = opts.tols.f_tol {
        solver = solver.with_sd_tolerance(f_tol)?;
    }
    Ok(solver)
}

/// initial_simplex — `n + 1` vertices: `x0` plus one per coordinate.
///
/// Vertex `i + 1` moves coordinate `i` by `scale · |x0_i|`, or by
/// [`ZERO_COORD_SIMPLEX_STEP`] when that coordinate is exactly zero.
pub fn initial_simplex(x0: &Point, scale: f64) -> Vec<Point> {
    let mut vertices = Vec::with_capacity(x0.len() + 1);
    vertices.push(x0.clone());
    for i in 0..x0.len() {
        let mut vertex = x0.clone();
        let step = if x0[i] == 0.0 { ZERO_COORD_SIMPLEX_STEP } else { scale * x0[i].abs() };
        vertex[i] += step;
        vertices.push(vertex);
    }
    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refinement::{
        errors::RefineError,
        local_optimizer::traits::{LineSearcher, Method, Tolerances},
    };
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::time::Duration;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Construction of L-BFGS solvers with both line searches.
    // - Propagation of `lbfgs_mem` (Some vs None).
    // - Nelder–Mead construction and the initial simplex geometry.
    //
    // They intentionally DO NOT cover executor behavior, which is tested in
    // the strategy layer.
    // -------------------------------------------------------------------------

    fn gradient_opts(line_searcher: LineSearcher, mem: Option<usize>) -> RefineOptions {
        let tols = Tolerances::new(Some(1e-10), None, Some(1e-8), Some(50))
            .expect("Tolerances should be valid");
        RefineOptions::new(
            Method::GradientBased { line_searcher },
            tols,
            Some(Duration::from_secs(5)),
            true,
            mem,
        )
        .expect("RefineOptions should be valid")
    }

    #[test]
    // Purpose
    // -------
    // Ensure that `build_optimizer_hager_zhang` succeeds and uses the crate
    // default L-BFGS memory when `opts.lbfgs_mem` is `None`.
    //
    // Given
    // -----
    // - Valid tolerances, `lbfgs_mem = None`.
    //
    // Expect
    // ------
    // - `Ok(_)`, no panic.
    fn build_optimizer_hager_zhang_uses_default_memory_when_none() {
        // Arrange
        let opts = gradient_opts(LineSearcher::HagerZhang, None);

        // Act
        let solver = build_optimizer_hager_zhang(&opts);

        // Assert
        assert!(solver.is_ok(), "Builder should succeed when lbfgs_mem is None");
    }

    #[test]
    fn build_optimizer_hager_zhang_respects_explicit_memory() {
        let opts = gradient_opts(LineSearcher::HagerZhang, Some(11));
        assert!(build_optimizer_hager_zhang(&opts).is_ok());
    }

    #[test]
    fn build_optimizer_more_thuente_uses_default_memory_when_none() {
        let opts = gradient_opts(LineSearcher::MoreThuente, None);
        assert!(build_optimizer_more_thuente(&opts).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // `configure_lbfgs` applies tolerances only when they are present.
    //
    // Given
    // -----
    // - Tolerances with only `max_iter` set.
    //
    // Expect
    // ------
    // - The solver is built with Argmin defaults and no error.
    fn configure_lbfgs_skips_missing_tolerances() {
        // Arrange
        let tols = Tolerances::new(None, None, None, Some(10)).expect("Tolerances should be valid");
        let mut opts = gradient_opts(LineSearcher::MoreThuente, None);
        opts.tols = tols;
        let raw = LbfgsMoreThuente::new(MoreThuenteLS::new(), DEFAULT_LBFGS_MEM);

        // Act
        let solver = configure_lbfgs(raw, &opts);

        // Assert
        assert!(solver.is_ok());
    }

    #[test]
    // Purpose
    // -------
    // The initial simplex has n + 1 vertices with one coordinate moved per
    // vertex; zero coordinates use the fixed absolute step.
    fn initial_simplex_moves_one_coordinate_per_vertex() {
        // Arrange
        let x0 = array![2.0, 0.0, -4.0];

        // Act
        let simplex = initial_simplex(&x0, 0.05);

        // Assert
        assert_eq!(simplex.len(), 4);
        assert_eq!(simplex[0], x0);
        let expected = [
            array![2.1, 0.0, -4.0],
            array![2.0, ZERO_COORD_SIMPLEX_STEP, -4.0],
            array![2.0, 0.0, -3.8],
        ];
        for (vertex, want) in simplex[1..].iter().zip(expected.iter()) {
            for (a, b) in vertex.iter().zip(want.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn build_simplex_rejects_empty_start() {
        let opts = RefineOptions::default();
        let empty = Point::zeros(0);
        assert_eq!(build_simplex(&empty, &opts).err(), Some(RefineError::EmptyStartPoint));
    }

    #[test]
    fn build_simplex_accepts_finite_start() {
        let opts = RefineOptions::default();
        assert!(build_simplex(&array![0.5, -0.5], &opts).is_ok());
    }
}
