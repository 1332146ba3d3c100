//! Top-k collection with paging and grouping.
//!
//! Each partition feeds a [`PartitionSortCollector`] with its matches. The
//! retained hits of every partition are handed to one [`SortCollector`],
//! which either slices the only partition's list directly or K-way merges
//! all lists into the global page.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::AHashMap;

use crate::engine::DocId;
use crate::error::{DrilldownError, Result};
use crate::sort::comparator::{DocComparator, ScoreDoc, SortValue};

/// Values of the group-by fields of a hit, one list per field.
pub type GroupKey = Vec<Vec<String>>;

/// Resolves the group key of a local document.
pub type GroupKeyFn<'a> = Box<dyn Fn(DocId) -> GroupKey + Send + Sync + 'a>;

/// A retained hit.
#[derive(Debug, Clone)]
pub struct CollectedHit {
    /// Index of the partition the hit came from.
    pub partition: usize,
    /// Partition-local document id.
    pub doc: DocId,
    /// Global document id.
    pub global_doc: u64,
    /// Relevance score.
    pub score: f32,
    /// Partition-independent sort value.
    pub sort_value: SortValue,
    /// Group key, when grouping.
    pub group_key: Option<GroupKey>,
    /// Total matches of the hit's group across all partitions.
    pub group_hit_count: u64,
}

impl CollectedHit {
    fn merge_cmp(&self, other: &Self) -> Ordering {
        self.sort_value
            .cmp(&other.sort_value)
            .then_with(|| self.global_doc.cmp(&other.global_doc))
    }
}

/// Everything one partition contributes to the merged page.
#[derive(Debug, Clone, Default)]
pub struct PartitionHits {
    /// Retained hits in rank order.
    pub hits: Vec<CollectedHit>,
    /// Number of matches, before paging or group capping.
    pub total_hits: u64,
    /// Matches per group.
    pub group_totals: AHashMap<GroupKey, u64>,
}

#[derive(Debug, Default)]
struct GroupBucket {
    total: u64,
    top: Vec<ScoreDoc>,
}

/// Per-partition top-k collector.
pub struct PartitionSortCollector<'a> {
    comparator: Box<dyn DocComparator + 'a>,
    capacity: usize,
    max_per_group: usize,
    group_key: Option<GroupKeyFn<'a>>,
    top: Vec<ScoreDoc>,
    groups: AHashMap<GroupKey, GroupBucket>,
    total_hits: u64,
}

impl<'a> PartitionSortCollector<'a> {
    /// Create a collector retaining at most `capacity` hits.
    pub fn new(comparator: Box<dyn DocComparator + 'a>, capacity: usize) -> Self {
        PartitionSortCollector {
            comparator,
            capacity,
            max_per_group: usize::MAX,
            group_key: None,
            top: Vec::new(),
            groups: AHashMap::new(),
            total_hits: 0,
        }
    }

    /// Group hits by `key`, retaining at most `max_per_group` per group.
    pub fn with_grouping(mut self, key: GroupKeyFn<'a>, max_per_group: usize) -> Self {
        self.group_key = Some(key);
        self.max_per_group = max_per_group.max(1);
        self
    }

    /// Number of documents collected so far.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Collect one match.
    pub fn collect(&mut self, doc: ScoreDoc) {
        self.total_hits += 1;
        let comparator = self.comparator.as_ref();
        match &self.group_key {
            None => insert_capped(&mut self.top, doc, self.capacity, comparator),
            Some(key_fn) => {
                let key = key_fn(doc.doc);
                let cap = self.max_per_group.min(self.capacity);
                let bucket = self.groups.entry(key).or_default();
                bucket.total += 1;
                insert_capped(&mut bucket.top, doc, cap, comparator);
            }
        }
    }

    /// Finish collecting; `doc_base` is the partition's global id offset.
    pub fn finish(self, partition: usize, doc_base: u64) -> PartitionHits {
        let comparator = self.comparator.as_ref();
        let make_hit = |doc: &ScoreDoc, key: Option<&GroupKey>| CollectedHit {
            partition,
            doc: doc.doc,
            global_doc: doc_base + u64::from(doc.doc),
            score: doc.score,
            sort_value: comparator.value(doc),
            group_key: key.cloned(),
            group_hit_count: 0,
        };

        if self.group_key.is_none() {
            return PartitionHits {
                hits: self.top.iter().map(|d| make_hit(d, None)).collect(),
                total_hits: self.total_hits,
                group_totals: AHashMap::new(),
            };
        }

        let mut ranked: Vec<(ScoreDoc, &GroupKey)> = self
            .groups
            .iter()
            .flat_map(|(key, bucket)| bucket.top.iter().map(move |d| (*d, key)))
            .collect();
        ranked.sort_by(|a, b| rank_cmp(comparator, &a.0, &b.0));

        PartitionHits {
            hits: ranked.iter().map(|(d, key)| make_hit(d, Some(*key))).collect(),
            total_hits: self.total_hits,
            group_totals: self
                .groups
                .iter()
                .map(|(key, bucket)| (key.clone(), bucket.total))
                .collect(),
        }
    }
}

fn rank_cmp(comparator: &dyn DocComparator, a: &ScoreDoc, b: &ScoreDoc) -> Ordering {
    comparator
        .compare(a, b)
        .then_with(|| a.doc.cmp(&b.doc))
}

fn insert_capped(list: &mut Vec<ScoreDoc>, doc: ScoreDoc, cap: usize, comparator: &dyn DocComparator) {
    let pos = list.partition_point(|x| rank_cmp(comparator, x, &doc) == Ordering::Less);
    if pos >= cap {
        return;
    }
    list.insert(pos, doc);
    list.truncate(cap);
}

/// The merged page.
#[derive(Debug, Clone, Default)]
pub struct CollectedHits {
    /// Hits of the requested page in rank order.
    pub hits: Vec<CollectedHit>,
    /// Total matches across partitions.
    pub total_hits: u64,
    /// Number of distinct groups, zero without grouping.
    pub total_groups: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectorState {
    Open,
    Collecting,
    Closed,
}

struct HeapEntry<'h> {
    hit: &'h CollectedHit,
    part: usize,
    pos: usize,
}

impl PartialEq for HeapEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry<'_> {}

impl PartialOrd for HeapEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; the best ranked hit must surface first
        other.hit.merge_cmp(self.hit)
    }
}

/// Merges per-partition hit lists into one page.
///
/// `Open` until the first partition is absorbed, `Collecting` while
/// partitions arrive, `Closed` once the page has been produced.
#[derive(Debug)]
pub struct SortCollector {
    offset: usize,
    count: usize,
    max_per_group: Option<usize>,
    state: CollectorState,
    parts: Vec<Option<PartitionHits>>,
}

impl SortCollector {
    /// Create a collector for `num_partitions` partitions.
    pub fn new(num_partitions: usize, offset: usize, count: usize) -> Self {
        SortCollector {
            offset,
            count,
            max_per_group: None,
            state: CollectorState::Open,
            parts: vec![None; num_partitions],
        }
    }

    /// Cap hits per group across partitions. 0 is treated as 1.
    pub fn with_max_per_group(mut self, max_per_group: usize) -> Self {
        self.max_per_group = Some(max_per_group.max(1));
        self
    }

    /// Number of hits each partition must retain.
    pub fn capacity(&self) -> usize {
        self.offset.saturating_add(self.count)
    }

    /// Whether the single partition's list is used as-is.
    pub fn is_single_partition(&self) -> bool {
        self.parts.len() == 1
    }

    /// Accept the retained hits of one partition.
    pub fn absorb(&mut self, partition: usize, hits: PartitionHits) -> Result<()> {
        if self.state == CollectorState::Closed {
            return Err(DrilldownError::invalid_operation(
                "sort collector is already closed",
            ));
        }
        let slot = self.parts.get_mut(partition).ok_or_else(|| {
            DrilldownError::invalid_argument(format!("no partition {partition}"))
        })?;
        if slot.is_some() {
            return Err(DrilldownError::invalid_operation(format!(
                "partition {partition} was already absorbed"
            )));
        }
        *slot = Some(hits);
        self.state = CollectorState::Collecting;
        Ok(())
    }

    /// Produce the page. Partitions never absorbed contribute nothing.
    pub fn close(&mut self) -> Result<CollectedHits> {
        if self.state == CollectorState::Closed {
            return Err(DrilldownError::invalid_operation(
                "sort collector is already closed",
            ));
        }
        self.state = CollectorState::Closed;

        let parts: Vec<PartitionHits> = self.parts.iter_mut().filter_map(Option::take).collect();
        let total_hits = parts.iter().map(|p| p.total_hits).sum();

        let mut group_totals: AHashMap<GroupKey, u64> = AHashMap::new();
        for part in &parts {
            for (key, total) in &part.group_totals {
                *group_totals.entry(key.clone()).or_default() += total;
            }
        }

        let mut page = if self.is_single_partition() {
            parts
                .into_iter()
                .next()
                .map(|p| p.hits.into_iter().skip(self.offset).take(self.count).collect())
                .unwrap_or_default()
        } else {
            self.merge(&parts)
        };

        for hit in &mut page {
            if let Some(key) = &hit.group_key {
                hit.group_hit_count = group_totals.get(key).copied().unwrap_or(0);
            }
        }

        Ok(CollectedHits {
            hits: page,
            total_hits,
            total_groups: group_totals.len() as u64,
        })
    }

    fn merge(&self, parts: &[PartitionHits]) -> Vec<CollectedHit> {
        let capacity = self.capacity();
        let mut heap = BinaryHeap::with_capacity(parts.len());
        for (part, hits) in parts.iter().enumerate() {
            if let Some(hit) = hits.hits.first() {
                heap.push(HeapEntry { hit, part, pos: 0 });
            }
        }

        let mut per_group: AHashMap<&GroupKey, usize> = AHashMap::new();
        let mut merged = Vec::with_capacity(capacity.min(1024));
        while merged.len() < capacity {
            let Some(HeapEntry { hit, part, pos }) = heap.pop() else {
                break;
            };
            if let Some(next) = parts[part].hits.get(pos + 1) {
                heap.push(HeapEntry {
                    hit: next,
                    part,
                    pos: pos + 1,
                });
            }

            if let (Some(max), Some(key)) = (self.max_per_group, &hit.group_key) {
                let used = per_group.entry(key).or_default();
                if *used >= max {
                    continue;
                }
                *used += 1;
            }
            merged.push(hit.clone());
        }

        merged.into_iter().skip(self.offset).collect()
    }
}
