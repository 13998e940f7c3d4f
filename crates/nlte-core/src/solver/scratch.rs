use crate::molecule::MolecularSpecies;

/// Ray buffers of one species.
#[derive(Debug, Clone, Default)]
pub struct SpeciesScratch {
    /// Mean intensity per line.
    pub jbar: Vec<f64>,
    /// Intensity arriving at the origin's half-step boundary, `[ray * lines + line]`.
    pub phot: Vec<f64>,
    /// Line profile weight at the origin per ray.
    pub vfac: Vec<f64>,
    /// Line-of-sight velocity offset from the origin's own motion per ray.
    pub offset: Vec<f64>,
    line_count: usize,
}

impl SpeciesScratch {
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn ray_phot(&self, ray: usize) -> &[f64] {
        &self.phot[ray * self.line_count..(ray + 1) * self.line_count]
    }

    pub fn ray_phot_mut(&mut self, ray: usize) -> &mut [f64] {
        &mut self.phot[ray * self.line_count..(ray + 1) * self.line_count]
    }
}

/// Worker-owned buffers reused for every point the worker handles.
#[derive(Debug, Clone, Default)]
pub struct GridPointScratch {
    pub species: Vec<SpeciesScratch>,
    /// Length of the origin's half first step per ray [m].
    pub half_first_ds: Vec<f64>,
    /// Running optical depth per `[species][line]` for the ray in flight.
    pub tau: Vec<Vec<f64>>,
    rays: usize,
}

impl GridPointScratch {
    pub fn new(species: &[MolecularSpecies]) -> Self {
        Self {
            species: species
                .iter()
                .map(|molecule| SpeciesScratch {
                    jbar: vec![0.0; molecule.line_count()],
                    line_count: molecule.line_count(),
                    ..SpeciesScratch::default()
                })
                .collect(),
            half_first_ds: Vec::new(),
            tau: species
                .iter()
                .map(|molecule| vec![0.0; molecule.line_count()])
                .collect(),
            rays: 0,
        }
    }

    /// Grows the per-ray buffers to hold `capacity` rays and clears the live
    /// ray count. Existing allocations are reused.
    pub fn reset(&mut self, capacity: usize) {
        for species in &mut self.species {
            species.phot.resize(capacity * species.line_count, 0.0);
            species.vfac.resize(capacity, 0.0);
            species.offset.resize(capacity, 0.0);
            species.jbar.fill(0.0);
        }
        self.half_first_ds.resize(capacity, 0.0);
        self.rays = 0;
    }

    /// Number of rays that reached a sink or saturated.
    pub fn rays(&self) -> usize {
        self.rays
    }

    pub(crate) fn commit_ray(&mut self) {
        self.rays += 1;
    }

    pub(crate) fn clear_tau(&mut self) {
        for tau in &mut self.tau {
            tau.fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GridPointScratch;
    use crate::molecule::fixtures::{three_level_species, two_level_species};

    #[test]
    fn reset_sizes_buffers_per_species() {
        let species = vec![two_level_species(), three_level_species()];
        let mut scratch = GridPointScratch::new(&species);
        scratch.reset(4);

        assert_eq!(scratch.species[0].phot.len(), 4);
        assert_eq!(scratch.species[1].phot.len(), 8);
        assert_eq!(scratch.species[1].ray_phot(3).len(), 2);
        assert_eq!(scratch.half_first_ds.len(), 4);
        assert_eq!(scratch.tau[1].len(), 2);

        scratch.species[1].ray_phot_mut(1)[1] = 2.5;
        assert_eq!(scratch.species[1].phot[3], 2.5);

        scratch.commit_ray();
        assert_eq!(scratch.rays(), 1);
        scratch.reset(2);
        assert_eq!(scratch.rays(), 0);
    }
}
