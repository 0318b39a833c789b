use scriptvisor_host::{PoolKind, WorldView};

/// Fill `out` with script handles of the live entities in pool `kind`
///
/// Walks the pool in slot order and stops at the end of the pool, once the
/// slot index reaches the capacity of `out`, or as soon as the script GUID
/// pool is full. Invalid and empty slots are skipped. Returns the number of
/// handles written.
pub fn collect_handles(world: &dyn WorldView, kind: PoolKind, out: &mut [i32]) -> usize {
    let Some(pool) = world.pool(kind) else {
        return 0;
    };

    let count = pool.count();
    if count <= 0 {
        return 0;
    }

    let mut written = 0;
    for i in 0..count {
        if i as usize >= out.len() || world.script_guid_pool_full() {
            break;
        }

        let Some(entity) = pool.slot(i) else {
            continue;
        };

        out[written] = world.script_handle(entity);
        written += 1;
    }

    written
}
