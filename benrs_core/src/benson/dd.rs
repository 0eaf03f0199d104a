//! Vertex enumeration by the double description method
//!
//! A [`Cone`] is a pointed polyhedral cone {x : a_i^T x >= 0} kept both as its list of
//! inequalities and as its list of extreme rays. Inequalities can be added one at a time, the
//! rays are updated incrementally. Polyhedra are handled in homogeneous coordinates (x, t),
//! where rays with t > 0 are vertices and rays with t = 0 are extreme directions.
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DdError {
    #[error("inequalities have rank {rank}, a pointed cone in dimension {dim} needs {dim}")]
    NotPointed { rank: usize, dim: usize },
    #[error("inequality has length {found}, expected {expected}")]
    Dimension { found: usize, expected: usize },
}

/// Pointed polyhedral cone in double description
#[derive(Debug, Clone)]
pub(crate) struct Cone {
    dim: usize,
    tolerance: f64,
    rows: Vec<DVector<f64>>,
    rays: Vec<DVector<f64>>,
}

fn normalised(v: DVector<f64>) -> Option<DVector<f64>> {
    let norm = v.norm();
    if norm > 0. && norm.is_finite() {
        Some(v / norm)
    } else {
        None
    }
}

/// Scale a ray to unit maximum norm
fn scaled(v: DVector<f64>) -> Option<DVector<f64>> {
    let max = v.amax();
    if max > 0. && max.is_finite() {
        Some(v / max)
    } else {
        None
    }
}

impl Cone {
    /// Build the cone {x : a^T x >= 0 for every a in `rows`}
    ///
    /// # Parameters
    /// - `dim`: dimension of the ambient space
    /// - `rows`: inequality normals, must contain `dim` linearly independent ones
    /// - `tolerance`: magnitude below which a scalar product counts as zero
    pub fn from_rows(dim: usize, rows: &[DVector<f64>], tolerance: f64) -> Result<Cone, DdError> {
        if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
            return Err(DdError::Dimension {
                found: bad.len(),
                expected: dim,
            });
        }
        let rows: Vec<DVector<f64>> = rows.iter().cloned().filter_map(normalised).collect();

        // Greedy choice of an independent subset, Gram-Schmidt on the normalised rows
        let mut basis: Vec<DVector<f64>> = Vec::with_capacity(dim);
        let mut chosen = Vec::with_capacity(dim);
        for (k, row) in rows.iter().enumerate() {
            if chosen.len() == dim {
                break;
            }
            let mut residual = row.clone();
            for b in &basis {
                residual -= b * b.dot(&residual);
            }
            let norm = residual.norm();
            if norm > 1e3 * tolerance.max(f64::EPSILON) {
                basis.push(residual / norm);
                chosen.push(k);
            }
        }
        if chosen.len() < dim {
            return Err(DdError::NotPointed {
                rank: chosen.len(),
                dim,
            });
        }

        // Rays of the simplicial cone are the columns of the inverse
        let initial = DMatrix::from_fn(dim, dim, |i, j| rows[chosen[i]][j]);
        let inverse = initial.try_inverse().ok_or(DdError::NotPointed {
            rank: dim - 1,
            dim,
        })?;
        let rays = inverse
            .column_iter()
            .filter_map(|c| scaled(c.into_owned()))
            .collect();
        let mut cone = Cone {
            dim,
            tolerance,
            rows: chosen.iter().map(|k| rows[*k].clone()).collect(),
            rays,
        };
        for (k, row) in rows.into_iter().enumerate() {
            if !chosen.contains(&k) {
                cone.insert(row);
            }
        }
        Ok(cone)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn rays(&self) -> &[DVector<f64>] {
        &self.rays
    }

    /// Intersect the cone with {x : a^T x >= 0}
    ///
    /// # Returns
    /// Whether the inequality cut off any ray
    pub fn add_row(&mut self, a: DVector<f64>) -> Result<bool, DdError> {
        if a.len() != self.dim {
            return Err(DdError::Dimension {
                found: a.len(),
                expected: self.dim,
            });
        }
        Ok(match normalised(a) {
            Some(a) => self.insert(a),
            None => false,
        })
    }

    fn zero_set(&self, ray: &DVector<f64>) -> Vec<bool> {
        self.rows
            .iter()
            .map(|r| r.dot(ray).abs() <= self.tolerance)
            .collect()
    }

    fn insert(&mut self, a: DVector<f64>) -> bool {
        let values: Vec<f64> = self.rays.iter().map(|r| a.dot(r)).collect();
        let negative: Vec<usize> = (0..values.len())
            .filter(|k| values[*k] < -self.tolerance)
            .collect();
        if negative.is_empty() {
            self.rows.push(a);
            return false;
        }
        let positive: Vec<usize> = (0..values.len())
            .filter(|k| values[*k] > self.tolerance)
            .collect();
        let zero_sets: Vec<Vec<bool>> = self.rays.iter().map(|r| self.zero_set(r)).collect();

        let mut new_rays: Vec<DVector<f64>> = (0..values.len())
            .filter(|k| values[*k] >= -self.tolerance)
            .map(|k| self.rays[k].clone())
            .collect();
        for &p in &positive {
            for &n in &negative {
                if !self.adjacent(p, n, &zero_sets) {
                    continue;
                }
                let combined = &self.rays[n] * values[p] - &self.rays[p] * values[n];
                if let Some(ray) = scaled(combined) {
                    if !new_rays.iter().any(|r| (r - &ray).amax() <= 1e3 * self.tolerance) {
                        new_rays.push(ray);
                    }
                }
            }
        }
        self.rows.push(a);
        self.rays = new_rays;
        true
    }

    /// Combinatorial adjacency test of two rays
    fn adjacent(&self, p: usize, n: usize, zero_sets: &[Vec<bool>]) -> bool {
        let common: Vec<usize> = (0..self.rows.len())
            .filter(|i| zero_sets[p][*i] && zero_sets[n][*i])
            .collect();
        if common.len() + 2 < self.dim {
            return false;
        }
        !zero_sets
            .iter()
            .enumerate()
            .any(|(k, z)| k != p && k != n && common.iter().all(|i| z[*i]))
    }
}

/// Polyhedron {x : a^T x >= b} in homogeneous coordinates
#[derive(Debug, Clone)]
pub(crate) struct Polyhedron {
    cone: Cone,
}

impl Polyhedron {
    /// Build from inequalities `(a, b)` meaning a^T x >= b
    pub fn new(dim: usize, inequalities: &[(DVector<f64>, f64)], tolerance: f64) -> Result<Polyhedron, DdError> {
        let mut rows: Vec<DVector<f64>> = inequalities
            .iter()
            .map(|(a, b)| homogenise(a, *b))
            .collect();
        rows.push(DVector::from_fn(dim + 1, |i, _| if i == dim { 1. } else { 0. }));
        Ok(Polyhedron {
            cone: Cone::from_rows(dim + 1, &rows, tolerance)?,
        })
    }

    /// Build from rows already in homogeneous form; the row t >= 0 is added
    pub fn from_homogeneous(dim: usize, rows: &[DVector<f64>], tolerance: f64) -> Result<Polyhedron, DdError> {
        let mut rows = rows.to_vec();
        rows.push(DVector::from_fn(dim + 1, |i, _| if i == dim { 1. } else { 0. }));
        Ok(Polyhedron {
            cone: Cone::from_rows(dim + 1, &rows, tolerance)?,
        })
    }

    /// Add a^T x >= b
    pub fn add_inequality(&mut self, a: &DVector<f64>, b: f64) -> Result<bool, DdError> {
        self.cone.add_row(homogenise(a, b))
    }

    /// Add a row in homogeneous form
    pub fn add_homogeneous(&mut self, row: DVector<f64>) -> Result<bool, DdError> {
        self.cone.add_row(row)
    }

    pub fn dim(&self) -> usize {
        self.cone.dim() - 1
    }

    pub fn vertices(&self) -> Vec<DVector<f64>> {
        let d = self.dim();
        self.cone
            .rays()
            .iter()
            .filter(|r| r[d] > self.cone.tolerance)
            .map(|r| r.rows(0, d) / r[d])
            .collect()
    }

    /// Extreme directions, scaled to unit maximum norm
    pub fn directions(&self) -> Vec<DVector<f64>> {
        let d = self.dim();
        self.cone
            .rays()
            .iter()
            .filter(|r| r[d] <= self.cone.tolerance)
            .filter_map(|r| scaled(r.rows(0, d).into_owned()))
            .collect()
    }
}

fn homogenise(a: &DVector<f64>, b: f64) -> DVector<f64> {
    let mut row = DVector::zeros(a.len() + 1);
    row.rows_mut(0, a.len()).copy_from(a);
    row[a.len()] = -b;
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    fn contains(points: &[DVector<f64>], target: &DVector<f64>) -> bool {
        points.iter().any(|p| (p - target).amax() < 1e-9)
    }

    #[test]
    fn orthant() {
        let rows = vec![dvector![1., 0.], dvector![0., 1.]];
        let cone = Cone::from_rows(2, &rows, 1e-10).unwrap();
        assert_eq!(cone.rays().len(), 2);
        assert!(contains(cone.rays(), &dvector![1., 0.]));
        assert!(contains(cone.rays(), &dvector![0., 1.]));
    }

    #[test]
    fn dual_of_generated_cone() {
        // cone generated by (1, 0) and (1, 1), its dual is generated by (0, 1) and (1, -1)
        let rows = vec![dvector![1., 0.], dvector![1., 1.]];
        let cone = Cone::from_rows(2, &rows, 1e-10).unwrap();
        assert_eq!(cone.rays().len(), 2);
        assert!(contains(cone.rays(), &dvector![0., 1.]));
        assert!(contains(cone.rays(), &dvector![1., -1.]));
    }

    #[test]
    fn square() {
        let ineqs = vec![
            (dvector![1., 0.], 0.),
            (dvector![0., 1.], 0.),
            (dvector![-1., 0.], -1.),
            (dvector![0., -1.], -1.),
        ];
        let square = Polyhedron::new(2, &ineqs, 1e-10).unwrap();
        let vertices = square.vertices();
        assert_eq!(vertices.len(), 4);
        for v in [dvector![0., 0.], dvector![1., 0.], dvector![0., 1.], dvector![1., 1.]] {
            assert!(contains(&vertices, &v));
        }
        assert!(square.directions().is_empty());
    }

    #[test]
    fn cutting_an_unbounded_region() {
        // x >= 0, y >= 0, x + y >= 1
        let mut region = Polyhedron::new(2, &[(dvector![1., 0.], 0.), (dvector![0., 1.], 0.)], 1e-10).unwrap();
        assert!(region.add_inequality(&dvector![1., 1.], 1.).unwrap());
        let vertices = region.vertices();
        assert_eq!(vertices.len(), 2);
        assert!(contains(&vertices, &dvector![1., 0.]));
        assert!(contains(&vertices, &dvector![0., 1.]));
        let directions = region.directions();
        assert_eq!(directions.len(), 2);
        assert!(contains(&directions, &dvector![1., 0.]));
        assert!(contains(&directions, &dvector![0., 1.]));
        // redundant inequality changes nothing
        assert!(!region.add_inequality(&dvector![1., 1.], 0.5).unwrap());
        assert_eq!(region.vertices().len(), 2);
    }

    #[test]
    fn cube_corner_cut() {
        let mut ineqs = Vec::new();
        for i in 0..3 {
            let mut e = DVector::zeros(3);
            e[i] = 1.;
            ineqs.push((e.clone(), 0.));
            ineqs.push((-e, -1.));
        }
        let mut cube = Polyhedron::new(3, &ineqs, 1e-10).unwrap();
        assert_eq!(cube.vertices().len(), 8);
        cube.add_inequality(&dvector![1., 1., 1.], 0.5).unwrap();
        // corner at the origin replaced by a triangle
        let vertices = cube.vertices();
        assert_eq!(vertices.len(), 10);
        assert!(!contains(&vertices, &dvector![0., 0., 0.]));
        assert!(contains(&vertices, &dvector![0.5, 0., 0.]));
    }

    #[test]
    fn cone_with_lineality() {
        match Cone::from_rows(2, &[dvector![1., 0.]], 1e-10) {
            Err(DdError::NotPointed { rank, dim }) => {
                assert_eq!(rank, 1);
                assert_eq!(dim, 2);
            }
            _ => panic!("Cone containing a line accepted"),
        }
    }
}
