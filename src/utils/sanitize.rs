use ammonia::Builder;
use maplit::hashset;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// 辅助材料富文本清理器
///
/// 教师在客户端使用富文本编辑器撰写辅助材料，入库前统一在这里
/// 剥离脚本和危险属性，只保留基础排版标签。
static SANITIZER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();

    // 允许的标签
    builder.tags(hashset![
        "h3", "h4",
        "p", "br",
        "strong", "em", "u", "s",
        "blockquote",
        "ul", "ol", "li",
        "a",
    ]);

    // 配置标签属性
    let mut tag_attrs = HashMap::new();
    tag_attrs.insert("a", hashset!["href", "title"]);
    builder.tag_attributes(tag_attrs);

    builder
});

/// 清理富文本，剥离脚本/样式/事件属性
pub fn clean_rich_text(input: &str) -> String {
    SANITIZER.clean(input).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_script_tags() {
        let dirty = "<p>默想经文</p><script>alert('xss')</script>";
        let clean = clean_rich_text(dirty);

        assert!(clean.contains("<p>默想经文</p>"));
        assert!(!clean.contains("script"));
        assert!(!clean.contains("alert"));
    }

    #[test]
    fn test_strips_event_attributes() {
        let dirty = r#"<p onclick="steal()">点击这里</p>"#;
        let clean = clean_rich_text(dirty);

        assert!(clean.contains("点击这里"));
        assert!(!clean.contains("onclick"));
    }

    #[test]
    fn test_keeps_basic_formatting() {
        let input = "<p><strong>中心思想</strong>：<em>信心</em></p><ul><li>第一点</li></ul>";
        let clean = clean_rich_text(input);

        assert_eq!(clean, input);
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(clean_rich_text("本周背诵诗篇23篇"), "本周背诵诗篇23篇");
    }
}
