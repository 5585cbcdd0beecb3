use rayon::slice::ParallelSliceMut;

use crate::mesh::Mesh;

/// Shared edge id for every facet edge. Edge `i` of a facet runs from its
/// vertex `i` to vertex `(i + 1) % 3`. Two facets meeting at an edge see the
/// same id, which is what lets the loop chainer walk from one intersection
/// line to the next without comparing coordinates.
#[derive(Debug, Clone)]
pub struct EdgeIds {
    ids: Box<[u32]>,
    edge_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EdgeKey {
    low: u32,
    high: u32,
    face: u32,
    edge: u8,
    flipped: bool,
}

impl EdgeIds {
    pub fn build(mesh: &Mesh) -> Self {
        let mut keys = Vec::with_capacity(mesh.face_count() * 3);
        for (face, vertices) in mesh.faces().iter().enumerate() {
            for edge in 0..3 {
                let (a, b) = (vertices[edge], vertices[(edge + 1) % 3]);
                keys.push(EdgeKey {
                    low: a.min(b),
                    high: a.max(b),
                    face: face as u32,
                    edge: edge as u8,
                    flipped: a > b,
                });
            }
        }
        keys.par_sort_unstable();

        let mut ids = vec![0; keys.len()].into_boxed_slice();
        let mut matched = vec![false; keys.len()];
        let mut edge_count = 0;

        for i in 0..keys.len() {
            if matched[i] {
                continue;
            }

            let key = keys[i];
            let same_edge = (i + 1..keys.len())
                .take_while(|&j| keys[j].low == key.low && keys[j].high == key.high)
                .filter(|&j| !matched[j]);

            // Prefer a partner wound the other way, as two well oriented
            // facets traverse their shared edge in opposite directions. Fall
            // back to any unmatched duplicate so non-manifold edges still
            // chain.
            let partner = same_edge
                .clone()
                .find(|&j| keys[j].flipped != key.flipped)
                .or_else(|| same_edge.clone().next());

            ids[key.face as usize * 3 + key.edge as usize] = edge_count;
            if let Some(j) = partner {
                let other = keys[j];
                ids[other.face as usize * 3 + other.edge as usize] = edge_count;
                matched[j] = true;
            }
            edge_count += 1;
        }

        Self { ids, edge_count }
    }

    /// The edge ids of one facet.
    pub fn facet(&self, facet: usize) -> [u32; 3] {
        let base = facet * 3;
        [self.ids[base], self.ids[base + 1], self.ids[base + 2]]
    }

    /// Number of distinct edge ids handed out.
    pub fn edge_count(&self) -> usize {
        self.edge_count as usize
    }
}
