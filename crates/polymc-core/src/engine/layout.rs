use crate::core::models::system::MAX_CONNECTIVITY;

/// Sentinel marking padding slots in the sorted-to-original map and empty
/// slots in the sorted neighbor matrix.
pub(crate) const NO_MONOMER: u32 = u32::MAX;

/// The packed, species-sorted memory layout.
///
/// Monomers are permuted so that every species occupies one contiguous,
/// alignment-padded region. The neighbor adjacency is re-addressed into a
/// column-major matrix per species: neighbor slot `s` of local monomer `m`
/// in species `c` lives at `matrix_offset(c) + s * pitch(c) + m`, giving
/// stride-one access for a warp of consecutive workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpeciesLayout {
    species_count: usize,
    counts: Vec<usize>,
    offsets: Vec<usize>,
    pitches: Vec<usize>,
    matrix_offsets: Vec<usize>,
    padded_len: usize,
    to_sorted: Vec<u32>,
    to_original: Vec<u32>,
}

impl SpeciesLayout {
    /// Plans the layout for a coloring.
    ///
    /// `alignment` must be a non-zero power of two (validated upstream by
    /// the configuration).
    pub fn plan(colors: &[u32], species_count: usize, alignment: usize) -> Self {
        let mut counts = vec![0usize; species_count];
        for &c in colors {
            counts[c as usize] += 1;
        }

        let mut offsets = Vec::with_capacity(species_count);
        let mut pitches = Vec::with_capacity(species_count);
        let mut matrix_offsets = Vec::with_capacity(species_count);
        let mut padded_len = 0usize;
        let mut matrix_len = 0usize;
        for &n in &counts {
            let pitch = n.div_ceil(alignment) * alignment;
            offsets.push(padded_len);
            pitches.push(pitch);
            matrix_offsets.push(matrix_len);
            padded_len += pitch;
            matrix_len += pitch * MAX_CONNECTIVITY;
        }

        let mut to_sorted = vec![NO_MONOMER; colors.len()];
        let mut to_original = vec![NO_MONOMER; padded_len];
        let mut placed = vec![0usize; species_count];
        for (original, &c) in colors.iter().enumerate() {
            let c = c as usize;
            let slot = offsets[c] + placed[c];
            placed[c] += 1;
            to_sorted[original] = slot as u32;
            to_original[slot] = original as u32;
        }

        Self {
            species_count,
            counts,
            offsets,
            pitches,
            matrix_offsets,
            padded_len,
            to_sorted,
            to_original,
        }
    }

    #[inline]
    pub fn species_count(&self) -> usize {
        self.species_count
    }

    /// Number of real monomers in species `c`.
    #[inline]
    pub fn count(&self, c: usize) -> usize {
        self.counts[c]
    }

    /// First sorted index of species `c`.
    #[inline]
    pub fn offset(&self, c: usize) -> usize {
        self.offsets[c]
    }

    /// Padded length of species `c`; also the row stride of its neighbor
    /// matrix.
    #[inline]
    pub fn pitch(&self, c: usize) -> usize {
        self.pitches[c]
    }

    /// Start of species `c` in the packed neighbor matrix.
    #[inline]
    pub fn matrix_offset(&self, c: usize) -> usize {
        self.matrix_offsets[c]
    }

    /// Total padded length of the sorted monomer arrays.
    #[inline]
    pub fn padded_len(&self) -> usize {
        self.padded_len
    }

    /// Total length of the packed neighbor matrix.
    #[inline]
    pub fn matrix_len(&self) -> usize {
        self.padded_len * MAX_CONNECTIVITY
    }

    /// Sorted slot of a loader-order monomer.
    #[inline]
    pub fn sorted_index(&self, original: usize) -> usize {
        self.to_sorted[original] as usize
    }

    /// Loader-order index behind a sorted slot, `None` for padding.
    #[inline]
    pub fn original_index(&self, sorted: usize) -> Option<usize> {
        match self.to_original[sorted] {
            NO_MONOMER => None,
            original => Some(original as usize),
        }
    }

    /// Species owning a sorted slot (padding included).
    pub fn species_of_slot(&self, sorted: usize) -> usize {
        debug_assert!(sorted < self.padded_len);
        self.offsets.partition_point(|&off| off <= sorted) - 1
    }
}
