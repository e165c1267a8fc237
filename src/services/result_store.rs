//! 结果集
//!
//! 只追加的有序集合，插入顺序就是提交顺序。除了整体清空之外不允许修改已有记录。

use crate::models::ResultRecord;

#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    records: Vec<ResultRecord>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// 只读视图，按提交顺序排列
    pub fn all(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
