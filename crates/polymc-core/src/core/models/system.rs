use super::position::PositionValue;
use nalgebra::Point3;
use thiserror::Error;

/// Maximum number of bond partners a monomer may hold.
///
/// The packed tag byte stores the neighbor count in its top three bits, and
/// the sorted neighbor matrix reserves exactly this many column slots, so
/// the bound is structural rather than a tunable.
pub const MAX_CONNECTIVITY: usize = 7;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("monomer index {index} out of range for a system of {count}")]
    MonomerOutOfRange { index: usize, count: usize },

    #[error("monomer {index} cannot bond to itself")]
    SelfBond { index: usize },

    #[error("monomer {index} already holds {MAX_CONNECTIVITY} bonds")]
    NeighborOverflow { index: usize },
}

/// The staged, loader-order polymer system.
///
/// This is the authoritative description of the system between staging and
/// `initialize`: positions and attribute tags indexed the way the loader
/// delivered them, plus the undirected bond adjacency. The engine permutes
/// a copy of this data into its species-sorted layout; the staged system
/// itself is never reordered.
#[derive(Debug, Clone, Default)]
pub struct PolymerSystem<P: PositionValue> {
    positions: Vec<Point3<P>>,
    attributes: Vec<i32>,
    neighbors: Vec<[u32; MAX_CONNECTIVITY]>,
    neighbor_counts: Vec<u8>,
    bonds: Vec<(u32, u32)>,
}

impl<P: PositionValue> PolymerSystem<P> {
    /// Creates a system of `monomer_count` monomers at the origin with no
    /// bonds and zeroed attributes.
    pub fn new(monomer_count: usize) -> Self {
        debug_assert!(monomer_count <= u32::MAX as usize);
        let origin = Point3::new(P::default(), P::default(), P::default());
        Self {
            positions: vec![origin; monomer_count],
            attributes: vec![0; monomer_count],
            neighbors: vec![[0; MAX_CONNECTIVITY]; monomer_count],
            neighbor_counts: vec![0; monomer_count],
            bonds: Vec::new(),
        }
    }

    /// Number of monomers in the system.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn check_index(&self, index: usize) -> Result<(), TopologyError> {
        if index >= self.len() {
            return Err(TopologyError::MonomerOutOfRange {
                index,
                count: self.len(),
            });
        }
        Ok(())
    }

    /// Sets the staged lattice position of one monomer.
    ///
    /// # Arguments
    ///
    /// * `index` - The loader-order monomer index.
    /// * `position` - The lattice position of the cube's lower-front-left
    ///   corner.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::MonomerOutOfRange`] for an unknown index.
    pub fn set_position(&mut self, index: usize, position: Point3<P>) -> Result<(), TopologyError> {
        self.check_index(index)?;
        self.positions[index] = position;
        Ok(())
    }

    /// Retrieves the staged position of one monomer.
    pub fn position(&self, index: usize) -> Option<Point3<P>> {
        self.positions.get(index).copied()
    }

    pub fn positions(&self) -> &[Point3<P>] {
        &self.positions
    }

    /// Sets the caller-defined attribute tag of one monomer. The engine
    /// stores the tag untouched.
    pub fn set_attribute(&mut self, index: usize, attribute: i32) -> Result<(), TopologyError> {
        self.check_index(index)?;
        self.attributes[index] = attribute;
        Ok(())
    }

    pub fn attribute(&self, index: usize) -> Option<i32> {
        self.attributes.get(index).copied()
    }

    /// Adds an undirected bond between two monomers.
    ///
    /// The operation is idempotent; adding an existing bond succeeds without
    /// creating duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::SelfBond`] for `first == second`,
    /// [`TopologyError::MonomerOutOfRange`] for unknown indices, and
    /// [`TopologyError::NeighborOverflow`] when either partner already holds
    /// [`MAX_CONNECTIVITY`] bonds.
    pub fn add_bond(&mut self, first: usize, second: usize) -> Result<(), TopologyError> {
        self.check_index(first)?;
        self.check_index(second)?;
        if first == second {
            return Err(TopologyError::SelfBond { index: first });
        }

        if self.neighbors_of(first).contains(&(second as u32)) {
            return Ok(());
        }
        if usize::from(self.neighbor_counts[first]) == MAX_CONNECTIVITY {
            return Err(TopologyError::NeighborOverflow { index: first });
        }
        if usize::from(self.neighbor_counts[second]) == MAX_CONNECTIVITY {
            return Err(TopologyError::NeighborOverflow { index: second });
        }

        for (a, b) in [(first, second), (second, first)] {
            let slot = usize::from(self.neighbor_counts[a]);
            self.neighbors[a][slot] = b as u32;
            self.neighbor_counts[a] += 1;
        }
        self.bonds
            .push((first.min(second) as u32, first.max(second) as u32));
        Ok(())
    }

    /// Number of bond partners of one monomer.
    pub fn neighbor_count(&self, index: usize) -> u8 {
        self.neighbor_counts.get(index).copied().unwrap_or(0)
    }

    /// Bond partners of one monomer, in insertion order.
    pub fn neighbors_of(&self, index: usize) -> &[u32] {
        match self.neighbors.get(index) {
            Some(slots) => &slots[..usize::from(self.neighbor_counts[index])],
            None => &[],
        }
    }

    /// All bonds as `(low, high)` index pairs, in insertion order.
    pub fn bonds(&self) -> &[(u32, u32)] {
        &self.bonds
    }
}
