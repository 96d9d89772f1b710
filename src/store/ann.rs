/// HNSW index for approximate nearest-neighbor search
use super::StoreError;
use crate::records::DocType;
use hnsw_rs::filter::FilterT;
use hnsw_rs::prelude::*;

/// Graph construction and search parameters
#[derive(Debug, Clone, Copy)]
pub struct AnnParams {
    /// Number of connections per layer
    pub m: usize,
    /// Construction breadth (higher = better recall, slower build)
    pub ef_construction: usize,
    /// Search breadth, raised to `k` when smaller
    pub ef_search: usize,
}

impl Default for AnnParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

/// Identity of the vector stored at one graph position
#[derive(Debug, Clone)]
pub struct AnnRow {
    pub id: String,
    pub doc_type: DocType,
}

/// Search result with cosine distance
#[derive(Debug, Clone)]
pub struct AnnHit {
    pub id: String,
    pub doc_type: DocType,
    pub distance: f32,
}

/// In-memory HNSW graph over one collection's vectors
///
/// Built in one pass from stored rows; graph position `i` is `rows[i]`.
/// The graph cannot drop points, so a changed collection is rebuilt.
pub struct AnnIndex {
    index: Hnsw<'static, f32, DistCosine>,
    rows: Vec<AnnRow>,
    dimension: usize,
    ef_search: usize,
}

struct DocTypeFilter<'a> {
    rows: &'a [AnnRow],
    doc_type: DocType,
}

impl FilterT for DocTypeFilter<'_> {
    fn hnsw_filter(&self, id: &usize) -> bool {
        self.rows
            .get(*id)
            .map(|row| row.doc_type == self.doc_type)
            .unwrap_or(false)
    }
}

impl AnnIndex {
    /// Build an index from `(row, vector)` pairs
    pub fn build(
        params: AnnParams,
        dimension: usize,
        items: Vec<(AnnRow, Vec<f32>)>,
    ) -> Result<Self, StoreError> {
        let index = Hnsw::<f32, DistCosine>::new(
            params.m,
            items.len().max(1),
            16, // max layers
            params.ef_construction,
            DistCosine,
        );

        let mut rows = Vec::with_capacity(items.len());
        for (position, (row, vector)) in items.into_iter().enumerate() {
            if vector.len() != dimension {
                return Err(StoreError::InvalidDimension {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            index.insert((vector.as_slice(), position));
            rows.push(row);
        }

        Ok(Self {
            index,
            rows,
            dimension,
            ef_search: params.ef_search,
        })
    }

    /// Search for the `k` nearest vectors, optionally restricted to one variant
    ///
    /// Results are sorted by distance ascending, ties by id.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        doc_type: Option<DocType>,
    ) -> Result<Vec<AnnHit>, StoreError> {
        if self.rows.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(StoreError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let k = k.min(self.rows.len());
        let ef = self.ef_search.max(k);

        let neighbours = match doc_type {
            Some(doc_type) => {
                let filter: &dyn FilterT = &DocTypeFilter {
                    rows: &self.rows,
                    doc_type,
                };
                self.index.search_filter(query, k, ef, Some(filter))
            }
            None => self.index.search(query, k, ef),
        };

        let mut hits: Vec<AnnHit> = neighbours
            .into_iter()
            .filter_map(|n| {
                self.rows.get(n.d_id).map(|row| AnnHit {
                    id: row.id.clone(),
                    doc_type: row.doc_type,
                    distance: n.distance,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(hits)
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, hot: &[(usize, f32)]) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        for (i, x) in hot {
            v[*i] = *x;
        }
        v
    }

    fn row(id: &str, doc_type: DocType) -> AnnRow {
        AnnRow {
            id: id.to_string(),
            doc_type,
        }
    }

    fn sample_index() -> AnnIndex {
        let items = vec![
            (row("e1", DocType::Employee), unit(8, &[(0, 1.0)])),
            (row("e2", DocType::Employee), unit(8, &[(1, 1.0)])),
            (row("j1", DocType::Job), unit(8, &[(0, 0.9), (1, 0.1)])),
        ];
        AnnIndex::build(AnnParams::default(), 8, items).unwrap()
    }

    #[test]
    fn test_empty_index() {
        let index = AnnIndex::build(AnnParams::default(), 8, Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&unit(8, &[(0, 1.0)]), 5, None).unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_search() {
        let index = sample_index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 8);

        let results = index.search(&unit(8, &[(0, 1.0)]), 2, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "e1");
        assert!(results[0].distance < 0.01);
        assert_eq!(results[1].id, "j1");
    }

    #[test]
    fn test_filtered_search() {
        let index = sample_index();
        let results = index
            .search(&unit(8, &[(0, 1.0)]), 5, Some(DocType::Job))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "j1");
    }

    #[test]
    fn test_dimension_validation() {
        let result = AnnIndex::build(
            AnnParams::default(),
            8,
            vec![(row("x", DocType::Job), vec![1.0; 4])],
        );
        assert!(result.is_err());

        let index = sample_index();
        assert!(index.search(&[1.0; 4], 1, None).is_err());
    }
}
