// Framebuffer cache
//
// GL has no render-pass object, so every begin_render_pass needs a
// framebuffer with the right attachments. They are created once per
// attachment set and reused. Keys use texture ids that are never reused,
// so a recycled GL texture name cannot hit a stale entry. Entries that
// mention a destroyed texture are evicted and their framebuffers deleted.

use std::collections::HashMap;

/// Ordered color attachments, by texture id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentKey {
    colors: Vec<u64>,
}

impl AttachmentKey {
    pub fn new(colors: impl IntoIterator<Item = u64>) -> Self {
        Self {
            colors: colors.into_iter().collect(),
        }
    }

    pub fn contains(&self, texture_id: u64) -> bool {
        self.colors.contains(&texture_id)
    }
}

#[derive(Debug)]
pub struct FramebufferCache<F> {
    entries: HashMap<AttachmentKey, F>,
}

impl<F> Default for FramebufferCache<F> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<F: Copy> FramebufferCache<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached framebuffer for `key`, creating it on first use.
    pub fn get_or_create<E>(&mut self, key: AttachmentKey, create: impl FnOnce() -> Result<F, E>) -> Result<F, E> {
        if let Some(framebuffer) = self.entries.get(&key) {
            return Ok(*framebuffer);
        }
        let framebuffer = create()?;
        log::debug!(
            target: crate::diagnostics::targets::GENERAL,
            "Created framebuffer for {} attachment(s) ({} cached)",
            key.colors.len(),
            self.entries.len() + 1
        );
        self.entries.insert(key, framebuffer);
        Ok(framebuffer)
    }

    /// Remove every entry that attaches `texture_id`, returning the
    /// framebuffers to delete.
    pub fn evict(&mut self, texture_id: u64) -> Vec<F> {
        let stale: Vec<AttachmentKey> = self.entries.keys().filter(|k| k.contains(texture_id)).cloned().collect();
        stale.iter().filter_map(|key| self.entries.remove(key)).collect()
    }

    pub fn drain(&mut self) -> Vec<F> {
        self.entries.drain().map(|(_, framebuffer)| framebuffer).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn same_attachments_reuse_one_framebuffer() {
        let mut cache = FramebufferCache::new();
        let created = Cell::new(0u32);
        let mut create = || -> Result<u32, ()> {
            created.set(created.get() + 1);
            Ok(created.get())
        };

        let a = cache.get_or_create(AttachmentKey::new([1, 2]), &mut create).unwrap();
        let b = cache.get_or_create(AttachmentKey::new([1, 2]), &mut create).unwrap();
        assert_eq!(a, b);
        assert_eq!(created.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn attachment_order_is_part_of_the_key() {
        let mut cache = FramebufferCache::new();
        let next = Cell::new(10u32);
        let mut create = || -> Result<u32, ()> {
            next.set(next.get() + 1);
            Ok(next.get())
        };

        let ab = cache.get_or_create(AttachmentKey::new([1, 2]), &mut create).unwrap();
        let ba = cache.get_or_create(AttachmentKey::new([2, 1]), &mut create).unwrap();
        assert_ne!(ab, ba);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_creation_is_not_cached() {
        let mut cache: FramebufferCache<u32> = FramebufferCache::new();
        assert!(cache.get_or_create(AttachmentKey::new([5]), || Err("incomplete")).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_create(AttachmentKey::new([5]), || Ok::<_, ()>(9)), Ok(9));
    }

    #[test]
    fn evicting_a_texture_drops_every_set_using_it() {
        let mut cache = FramebufferCache::new();
        cache.get_or_create(AttachmentKey::new([1]), || Ok::<_, ()>(100)).unwrap();
        cache.get_or_create(AttachmentKey::new([1, 2]), || Ok::<_, ()>(101)).unwrap();
        cache.get_or_create(AttachmentKey::new([3]), || Ok::<_, ()>(102)).unwrap();

        let mut evicted = cache.evict(1);
        evicted.sort_unstable();
        assert_eq!(evicted, vec![100, 101]);
        assert_eq!(cache.len(), 1);
        assert!(cache.evict(1).is_empty());

        assert_eq!(cache.drain(), vec![102]);
        assert!(cache.is_empty());
    }
}
