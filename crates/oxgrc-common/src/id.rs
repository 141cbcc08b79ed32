//! 全局记录 ID。
//!
//! 所有 GRC 实体（框架、统一控制、问题、审计日志等）共用一个进程级
//! Snowflake 生成器，产出大致按创建时间递增的数字字符串，列表接口据此
//! 做稳定排序。

use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// 以部署标识初始化生成器。多实例部署时各实例必须使用互不相同的
/// `machine_id` / `node_id`（取值 0-31），否则可能产生重复 ID。
pub fn init(machine_id: i32, node_id: i32) {
    let mut slot = GENERATOR.lock().unwrap();
    *slot = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// 生成下一个实体 ID。未经 `init` 调用时退回单实例缺省标识，
/// 测试和一次性工具无需初始化即可直接使用。
pub fn next_id() -> String {
    let mut slot = GENERATOR.lock().unwrap();
    slot.get_or_insert_with(|| SnowflakeIdBucket::new(0, 0))
        .get_id()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_within_a_batch() {
        init(2, 3);
        let ids: Vec<String> = (0..500).map(|_| next_id()).collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn ids_parse_as_i64() {
        let id = next_id();
        assert!(id.parse::<i64>().is_ok(), "expected numeric id, got {id}");
    }
}
