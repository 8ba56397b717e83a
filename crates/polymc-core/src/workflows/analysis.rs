use crate::core::models::position::PositionValue;
use itertools::Itertools;
use nalgebra::Point3;
use std::ops::Range;

fn squared_distance<P: PositionValue>(a: Point3<P>, b: Point3<P>) -> f64 {
    let dx = (b.x.to_i32() - a.x.to_i32()) as f64;
    let dy = (b.y.to_i32() - a.y.to_i32()) as f64;
    let dz = (b.z.to_i32() - a.z.to_i32()) as f64;
    dx * dx + dy * dy + dz * dz
}

/// Mean squared end-to-end distance over a set of chains, each given as a
/// contiguous range of loader-order indices.
///
/// Positions are stored unwrapped, so the observable is meaningful in
/// periodic boxes: a chain that has drifted across the wrap keeps its true
/// extension.
pub fn mean_squared_end_to_end<P: PositionValue>(
    positions: &[Point3<P>],
    chains: &[Range<usize>],
) -> f64 {
    let spans: Vec<f64> = chains
        .iter()
        .filter(|chain| chain.len() >= 2)
        .map(|chain| squared_distance(positions[chain.start], positions[chain.end - 1]))
        .collect();
    if spans.is_empty() {
        return 0.0;
    }
    spans.iter().sum::<f64>() / spans.len() as f64
}

/// Mean squared bond length over consecutive monomers of each chain.
pub fn mean_squared_bond_length<P: PositionValue>(
    positions: &[Point3<P>],
    chains: &[Range<usize>],
) -> f64 {
    let mut sum = 0.0;
    let mut bonds = 0usize;
    for chain in chains {
        for (i, j) in chain.clone().tuple_windows() {
            sum += squared_distance(positions[i], positions[j]);
            bonds += 1;
        }
    }
    if bonds == 0 { 0.0 } else { sum / bonds as f64 }
}
