use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::hash::Hash;
use std::sync::Mutex;

use crate::error::Error;
use crate::error::Result;

/// A bucket holds up to `capacity` key/value entries whose hashes agree
/// on the low `depth` bits.
#[derive(Debug)]
struct Bucket<K, V> {
    items: Vec<(K, V)>,
    capacity: usize,
    depth: u32,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(capacity: usize, depth: u32) -> Self {
        Bucket { items: Vec::with_capacity(capacity), capacity, depth }
    }

    /// Linear scan for the key; the first match wins. The scan is fine
    /// because the capacity is small.
    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or update an entry. An existing key is updated in place even
    /// when the bucket is full; a new key is rejected with false once
    /// `capacity` entries are present.
    fn insert(&mut self, key: K, value: V) -> bool {
        if let Some(entry) = self.items.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
            return true;
        }
        if self.is_full() {
            return false;
        }
        self.items.push((key, value));
        true
    }

    /// Remove the first entry matching the key, returning whether one was
    /// removed.
    fn remove(&mut self, key: &K) -> bool {
        match self.items.iter().position(|(k, _)| k == key) {
            Some(i) => {
                self.items.remove(i);
                true
            }
            None => false,
        }
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    fn items(&self) -> &[(K, V)] {
        &self.items
    }

    /// Drain every entry out of the bucket, for redistribution after a
    /// split.
    fn take_items(&mut self) -> Vec<(K, V)> {
        std::mem::take(&mut self.items)
    }

    fn depth(&self) -> u32 {
        self.depth
    }

    fn increment_depth(&mut self) {
        self.depth += 1;
    }
}

/// An extendible hash table: a directory of 2^global_depth slots, each
/// referencing a bucket with its own local depth. A key is routed by the
/// low global_depth bits of its hash. Overflow is handled by splitting
/// the overflowed bucket (doubling the directory when that bucket already
/// uses every directory bit) instead of rehashing the whole table.
///
/// Buckets live in an arena and directory slots store arena indices, so
/// several slots may share one bucket. Buckets are never merged and the
/// directory never shrinks.
///
/// The table is generic over the hash builder, std HashMap style, with a
/// RandomState default.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    global_depth: u32,
    bucket_capacity: usize,
    /// Directory of 2^global_depth arena indices.
    dir: Vec<usize>,
    /// Bucket arena; a bucket is never dropped, only split.
    buckets: Vec<Bucket<K, V>>,
    hash_builder: S,
}

impl<K: Hash + Eq + Clone, V: Clone> ExtendibleHashTable<K, V> {
    pub fn new(bucket_capacity: usize) -> Self {
        Self::with_hasher(bucket_capacity, RandomState::new())
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    pub fn with_hasher(bucket_capacity: usize, hash_builder: S) -> Self {
        assert!(bucket_capacity > 0, "bucket capacity must be larger than zero");
        ExtendibleHashTable {
            global_depth: 0,
            bucket_capacity,
            dir: vec![0],
            buckets: vec![Bucket::new(bucket_capacity, 0)],
            hash_builder,
        }
    }

    /// Directory slot of a key: the low global_depth bits of its hash.
    fn index_of(&self, key: &K) -> usize {
        let mask = (1usize << self.global_depth) - 1;
        self.hash_builder.hash_one(key) as usize & mask
    }

    pub fn find(&self, key: &K) -> Option<V> {
        let bucket = &self.buckets[self.dir[self.index_of(key)]];
        bucket.find(key).cloned()
    }

    /// Insert a key/value pair, splitting the target bucket as many times
    /// as it takes for the pair to fit. An existing key has its value
    /// overwritten.
    ///
    /// Returns Error::BucketExhausted when the target bucket is full of
    /// entries that hash identically to the key, since splitting can never
    /// separate those.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        loop {
            let bucket_idx = self.dir[self.index_of(&key)];
            if self.buckets[bucket_idx].insert(key.clone(), value.clone()) {
                return Ok(());
            }
            // the target bucket is full. splitting only helps if at least
            // one resident hash differs from the incoming one.
            let hash = self.hash_builder.hash_one(&key);
            let colliding = self.buckets[bucket_idx]
                .items()
                .iter()
                .all(|(k, _)| self.hash_builder.hash_one(k) == hash);
            if colliding {
                return Err(Error::BucketExhausted);
            }
            self.split(bucket_idx);
        }
    }

    /// Remove the entry for a key, returning whether one was removed.
    /// Buckets are not merged on removal.
    pub fn remove(&mut self, key: &K) -> bool {
        let bucket_idx = self.dir[self.index_of(key)];
        self.buckets[bucket_idx].remove(key)
    }

    /// Split the given bucket into itself and a new split image one depth
    /// level down, doubling the directory first when the bucket already
    /// uses every directory bit.
    fn split(&mut self, bucket_idx: usize) {
        let depth = self.buckets[bucket_idx].depth();
        if depth == self.global_depth {
            // double the directory; new slot i references the same bucket
            // as slot i - old_size, the slot with the same low bits.
            self.dir.extend_from_within(..);
            self.global_depth += 1;
        }
        self.buckets[bucket_idx].increment_depth();
        let image_idx = self.buckets.len();
        self.buckets.push(Bucket::new(self.bucket_capacity, depth + 1));

        // of the slots that referenced the split bucket, those whose bit
        // `depth` is set move over to the image.
        for (slot, idx) in self.dir.iter_mut().enumerate() {
            if *idx == bucket_idx && (slot >> depth) & 1 == 1 {
                *idx = image_idx;
            }
        }

        // redistribute the entries through the updated directory. each
        // side receives at most the original entry count, so these inserts
        // cannot overflow.
        for (key, value) in self.buckets[bucket_idx].take_items() {
            let idx = self.dir[self.index_of(&key)];
            let inserted = self.buckets[idx].insert(key, value);
            debug_assert!(inserted);
        }
    }

    pub fn global_depth(&self) -> u32 {
        self.global_depth
    }

    /// Local depth of the bucket referenced by the given directory slot.
    pub fn local_depth(&self, dir_index: usize) -> u32 {
        self.buckets[self.dir[dir_index]].depth()
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.items().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of every entry in the table.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.buckets.iter().flat_map(|b| b.items().iter().cloned()).collect()
    }
}

/// SyncExtendibleHashTable implements the thread-safe version of the
/// extendible hash table, basically all the heavy lifting happens in the
/// ExtendibleHashTable.
pub struct SyncExtendibleHashTable<K, V, S = RandomState> {
    inner: Mutex<ExtendibleHashTable<K, V, S>>,
}

impl<K: Hash + Eq + Clone, V: Clone> SyncExtendibleHashTable<K, V> {
    pub fn new(bucket_capacity: usize) -> Self {
        SyncExtendibleHashTable { inner: Mutex::new(ExtendibleHashTable::new(bucket_capacity)) }
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> SyncExtendibleHashTable<K, V, S> {
    pub fn with_hasher(bucket_capacity: usize, hash_builder: S) -> Self {
        let inner = Mutex::new(ExtendibleHashTable::with_hasher(bucket_capacity, hash_builder));
        SyncExtendibleHashTable { inner }
    }

    pub fn find(&self, key: &K) -> Option<V> {
        let guard = self.inner.lock().unwrap();
        guard.find(key)
    }

    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let mut guard = self.inner.lock()?;
        guard.insert(key, value)
    }

    pub fn remove(&self, key: &K) -> bool {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(key)
    }

    pub fn global_depth(&self) -> u32 {
        let guard = self.inner.lock().unwrap();
        guard.global_depth()
    }

    pub fn num_buckets(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.num_buckets()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.is_empty()
    }

    pub fn entries(&self) -> Vec<(K, V)> {
        let guard = self.inner.lock().unwrap();
        guard.entries()
    }
}

#[cfg(test)]
mod tests {
    use std::hash::BuildHasherDefault;
    use std::hash::Hasher;

    use super::*;

    /// Hashes an integer key to itself, so tests can pick hash values
    /// directly.
    #[derive(Default)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            let n = bytes.len().min(8);
            let mut buf = [0u8; 8];
            buf[..n].copy_from_slice(&bytes[..n]);
            self.0 = u64::from_le_bytes(buf);
        }

        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }

        fn write_usize(&mut self, n: usize) {
            self.0 = n as u64;
        }
    }

    type Identity = BuildHasherDefault<IdentityHasher>;

    /// Shifts integer keys left one bit, so every hash is even and the
    /// first directory bit alone can never separate a full bucket.
    #[derive(Default)]
    struct EvenHasher(u64);

    impl Hasher for EvenHasher {
        fn finish(&self) -> u64 {
            self.0 << 1
        }

        fn write(&mut self, bytes: &[u8]) {
            let n = bytes.len().min(8);
            let mut buf = [0u8; 8];
            buf[..n].copy_from_slice(&bytes[..n]);
            self.0 = u64::from_le_bytes(buf);
        }

        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }

        fn write_usize(&mut self, n: usize) {
            self.0 = n as u64;
        }
    }

    /// Hashes every key to zero, forcing total collisions.
    #[derive(Default)]
    struct ZeroHasher;

    impl Hasher for ZeroHasher {
        fn finish(&self) -> u64 {
            0
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    /// Every bucket of local depth d must be referenced by exactly
    /// 2^(global_depth - d) directory slots, and those slots must agree on
    /// their low d bits.
    fn check_directory_invariant<K: Hash + Eq + Clone, V: Clone, S: BuildHasher>(
        table: &ExtendibleHashTable<K, V, S>,
    ) {
        for (bucket_idx, bucket) in table.buckets.iter().enumerate() {
            let depth = bucket.depth();
            assert!(table.global_depth >= depth);
            let slots: Vec<usize> = table
                .dir
                .iter()
                .enumerate()
                .filter(|(_, &idx)| idx == bucket_idx)
                .map(|(slot, _)| slot)
                .collect();
            assert_eq!(1 << (table.global_depth - depth), slots.len());
            let mask = (1usize << depth) - 1;
            for slot in &slots {
                assert_eq!(slots[0] & mask, slot & mask);
            }
        }
    }

    #[test]
    fn test_insert_find() -> crate::error::Result<()> {
        // every hash is even, so the first doubling separates nothing and
        // the insert of the third key must split the same bucket twice.
        let mut table: ExtendibleHashTable<u64, String, BuildHasherDefault<EvenHasher>> =
            ExtendibleHashTable::with_hasher(2, BuildHasherDefault::default());

        table.insert(1, String::from("a"))?;
        table.insert(2, String::from("b"))?;
        table.insert(3, String::from("c"))?;
        table.insert(4, String::from("d"))?;

        assert_eq!(Some(String::from("a")), table.find(&1));
        assert_eq!(Some(String::from("b")), table.find(&2));
        assert_eq!(Some(String::from("c")), table.find(&3));
        assert_eq!(Some(String::from("d")), table.find(&4));
        assert_eq!(None, table.find(&5));

        // the directory had to double twice before the third key fit.
        assert_eq!(2, table.global_depth());
        assert_eq!(3, table.num_buckets());
        assert_eq!(4, table.len());
        check_directory_invariant(&table);

        Ok(())
    }

    #[test]
    fn test_even_odd_split() -> crate::error::Result<()> {
        let mut table: ExtendibleHashTable<u64, String, Identity> =
            ExtendibleHashTable::with_hasher(2, Identity::default());

        table.insert(1, String::from("a"))?;
        table.insert(2, String::from("b"))?;
        table.insert(3, String::from("c"))?;
        table.insert(4, String::from("d"))?;

        for (key, value) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
            assert_eq!(Some(String::from(value)), table.find(&key));
        }

        // with identity hashing the low bit separates odd from even into
        // two half-full buckets, so a single doubling suffices.
        assert_eq!(1, table.global_depth());
        assert_eq!(2, table.num_buckets());
        assert_eq!(4, table.len());
        check_directory_invariant(&table);

        Ok(())
    }

    #[test]
    fn test_directory_doubling() -> crate::error::Result<()> {
        let mut table: ExtendibleHashTable<u64, u64, Identity> =
            ExtendibleHashTable::with_hasher(1, Identity::default());

        table.insert(0, 100)?;
        table.insert(1, 101)?;

        assert_eq!(1, table.global_depth());
        assert_eq!(2, table.num_buckets());
        assert_eq!(1, table.local_depth(0));
        assert_eq!(1, table.local_depth(1));
        assert_eq!(Some(100), table.find(&0));
        assert_eq!(Some(101), table.find(&1));
        check_directory_invariant(&table);

        Ok(())
    }

    #[test]
    fn test_repeated_split() -> crate::error::Result<()> {
        // keys that agree on their low two bits force one insert to split
        // the same bucket three times, doubling the directory each time.
        let mut table: ExtendibleHashTable<u64, u64, Identity> =
            ExtendibleHashTable::with_hasher(2, Identity::default());

        table.insert(0, 0)?;
        table.insert(4, 4)?;
        table.insert(8, 8)?;
        table.insert(12, 12)?;

        assert_eq!(3, table.global_depth());
        assert_eq!(4, table.num_buckets());
        for key in [0, 4, 8, 12] {
            assert_eq!(Some(key), table.find(&key));
        }
        check_directory_invariant(&table);

        Ok(())
    }

    #[test]
    fn test_update_in_place() -> crate::error::Result<()> {
        let mut table: ExtendibleHashTable<u64, String, Identity> =
            ExtendibleHashTable::with_hasher(2, Identity::default());

        table.insert(1, String::from("a"))?;
        table.insert(1, String::from("b"))?;
        assert_eq!(1, table.len());
        assert_eq!(Some(String::from("b")), table.find(&1));

        // updating a key in a full bucket must not split.
        table.insert(3, String::from("c"))?;
        let buckets = table.num_buckets();
        table.insert(1, String::from("d"))?;
        assert_eq!(buckets, table.num_buckets());
        assert_eq!(Some(String::from("d")), table.find(&1));

        Ok(())
    }

    #[test]
    fn test_remove() -> crate::error::Result<()> {
        let mut table: ExtendibleHashTable<u64, u64, Identity> =
            ExtendibleHashTable::with_hasher(2, Identity::default());

        for key in 0..8 {
            table.insert(key, key * 10)?;
        }
        let global_depth = table.global_depth();

        assert!(table.remove(&3));
        assert_eq!(None, table.find(&3));
        assert!(!table.remove(&3));

        // removal neither merges buckets nor shrinks the directory.
        assert_eq!(global_depth, table.global_depth());
        check_directory_invariant(&table);

        // the other entries are untouched.
        for key in [0, 1, 2, 4, 5, 6, 7] {
            assert_eq!(Some(key * 10), table.find(&key));
        }

        Ok(())
    }

    #[test]
    fn test_many_inserts_keep_invariants() -> crate::error::Result<()> {
        let mut table: ExtendibleHashTable<u64, u64, Identity> =
            ExtendibleHashTable::with_hasher(4, Identity::default());

        for key in 0..64 {
            table.insert(key, key)?;
            check_directory_invariant(&table);
        }
        assert_eq!(64, table.len());
        for key in 0..64 {
            assert_eq!(Some(key), table.find(&key));
        }

        for key in (0..64).step_by(2) {
            assert!(table.remove(&key));
        }
        assert_eq!(32, table.len());
        assert_eq!(32, table.entries().len());
        check_directory_invariant(&table);

        Ok(())
    }

    #[test]
    fn test_bucket_exhausted() {
        let mut table: ExtendibleHashTable<u64, u64, BuildHasherDefault<ZeroHasher>> =
            ExtendibleHashTable::with_hasher(2, BuildHasherDefault::default());

        table.insert(1, 1).unwrap();
        table.insert(2, 2).unwrap();
        // every key hashes to zero; the bucket can never be split apart.
        assert_eq!(Err(Error::BucketExhausted), table.insert(3, 3));
        // the table is still usable for the resident keys.
        assert_eq!(Some(1), table.find(&1));
        assert_eq!(Some(2), table.find(&2));
    }

    #[test]
    fn test_sync_table() -> crate::error::Result<()> {
        let table: SyncExtendibleHashTable<u64, u64> = SyncExtendibleHashTable::new(2);

        for key in 0..16 {
            table.insert(key, key + 100)?;
        }
        assert_eq!(16, table.len());
        for key in 0..16 {
            assert_eq!(Some(key + 100), table.find(&key));
        }
        assert!(table.remove(&7));
        assert_eq!(None, table.find(&7));
        assert_eq!(15, table.entries().len());
        assert!(!table.is_empty());

        Ok(())
    }
}
