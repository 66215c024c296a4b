//! 规则索引缓存管理
//! 仅处理编译结果的持有、失效与发布，不参与编译本身

use std::sync::{Arc, RwLock};

use crate::compiler::CategoryIndex;

/// 缓存槽：索引与失效版本号同锁存放
#[derive(Debug, Default)]
struct CacheSlot {
    epoch: u64,
    index: Option<Arc<CategoryIndex>>,
}

/// 索引缓存
/// 规则源集合变化时整体失效并递增版本号，重建后按版本号原子发布
#[derive(Debug, Default)]
pub struct IndexCache {
    slot: RwLock<CacheSlot>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取当前缓存的索引
    pub fn get(&self) -> Option<Arc<CategoryIndex>> {
        self.slot.read().unwrap().index.clone()
    }

    /// 当前失效版本号；重建前读取，发布时回传校验
    pub fn epoch(&self) -> u64 {
        self.slot.read().unwrap().epoch
    }

    /// 发布新构建的索引
    /// 写锁内双检：已有索引时保留先到者；版本号已变说明构建期间
    /// 有新规则源注册，该构建不入缓存，返回值仅供本次调用使用
    pub fn publish(&self, epoch: u64, index: Arc<CategoryIndex>) -> Arc<CategoryIndex> {
        let mut slot = self.slot.write().unwrap();
        if let Some(existing) = slot.index.as_ref() {
            return existing.clone();
        }
        if slot.epoch != epoch {
            return index;
        }
        slot.index = Some(index.clone());
        index
    }

    /// 使缓存失效并递增版本号（注册新规则源后调用）
    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap();
        slot.epoch += 1;
        slot.index = None;
    }
}
