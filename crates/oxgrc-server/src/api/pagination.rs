use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

/// 单页数据量上限
pub const MAX_PAGE_LIMIT: usize = 1000;

/// 分页查询参数
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// 每页数量（默认 20，最大 1000）
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    /// 偏移量（默认 0）
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

impl PaginationParams {
    pub fn limit(&self) -> usize {
        let limit = self.limit.unwrap_or(20) as usize;
        limit.min(MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0) as usize
    }
}

/// 兼容 query string 中数字以字符串形式传入的情况
pub fn deserialize_optional_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum U64Input {
        Number(u64),
        Text(String),
    }

    let value: Option<U64Input> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(U64Input::Number(n)) => Ok(Some(n)),
        Some(U64Input::Text(s)) => {
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<u64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_defaults_and_cap() {
        let p = PaginationParams {
            limit: None,
            offset: None,
        };
        assert_eq!(p.limit(), 20);
        assert_eq!(p.offset(), 0);

        let p = PaginationParams {
            limit: Some(5000),
            offset: Some(40),
        };
        assert_eq!(p.limit(), MAX_PAGE_LIMIT);
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn test_deserialize_string_numbers() {
        let p: PaginationParams = serde_json::from_str(r#"{"limit":"50","offset":"10"}"#)
            .expect("string numbers should parse");
        assert_eq!(p.limit, Some(50));
        assert_eq!(p.offset, Some(10));
    }

    #[test]
    fn test_deserialize_empty_string_as_none() {
        let p: PaginationParams =
            serde_json::from_str(r#"{"limit":"","offset":""}"#).expect("empty strings allowed");
        assert_eq!(p.limit, None);
        assert_eq!(p.offset, None);
    }
}
