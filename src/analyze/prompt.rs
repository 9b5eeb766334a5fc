// src/analyze/prompt.rs
//! Prompt text for the report analyzer.

use crate::ingest::NewsItem;
use crate::text::truncate_chars;

pub const SYSTEM_PROMPT: &str = "你是一位资深的体育评论员和分析专家。你的核心任务是：
1. **提取每条新闻的关键内容**：从新闻中提炼出核心信息（事件、人物、数据、结果等）
2. **进行专业点评**：对每条新闻进行深度分析和专业点评，提供独到见解
3. **分析影响和意义**：解读新闻事件的影响、价值和未来趋势

请用专业、客观、有深度的语言，以Markdown格式生成分析报告。";

const REPORT_REQUIREMENTS: &str = "请生成一份Markdown格式的体育新闻分析报告，要求：

## 报告结构

### 一、今日新闻概览

今日新闻综述：简要总结今日主要体育新闻事件（2-3句话）

### 二、新闻关键内容提取与点评

**对每条新闻，按以下格式进行提取和点评：**

#### 新闻1：[新闻标题]

**关键内容提取：**
- **核心事件：** （用一句话概括新闻的核心事件）
- **关键人物：** （列出涉及的重要人物）
- **重要数据：** （比赛比分、统计数据、时间等关键数字）
- **比赛结果/事件结果：** （如果是比赛新闻，说明结果；如果是其他事件，说明结果）

**专业点评：**
（事件的意义和价值，对相关球队、球员、联赛的影响，背后的原因和背景，未来可能的发展趋势。
要求有独到见解，不要只是复述新闻内容，要有分析和判断）

---

（继续处理所有新闻，确保每条新闻都有详细的提取和点评）

### 三、综合分析

**热点话题：**
（总结今日体育领域的热点话题，分析其背后的原因和意义）

**趋势预测：**
（基于今日新闻，预测相关事件的发展趋势和可能的影响）

**整体评价：**
（对今日体育新闻的整体评价，判断整体舆论倾向：正面/负面/中性，并说明理由）

**要求：**
- 使用Markdown格式（标题用##、###，列表用-，强调用**粗体**等）
- **重点是对每条新闻进行关键内容提取和专业点评**
- 点评要有深度，不能只是简单复述新闻内容
- 语言专业、客观、有见解
- 字数控制在2000-4000字之间
- 确保每条新闻都有详细的提取和点评
";

/// One block listing every item; bodies cut to `max_chars`.
pub fn format_news(items: &[NewsItem], max_chars: usize) -> String {
    let mut parts = Vec::with_capacity(items.len() + 2);
    parts.push(format!("=== 今日体育新闻（共{}条）===\n", items.len()));
    for (i, item) in items.iter().enumerate() {
        let source = if item.source.is_empty() { "未知" } else { item.source.as_str() };
        parts.push(format!(
            "\n【新闻{}】\n标题：{}\n来源：{} | 类别：{}\n内容：\n{}\n---\n",
            i + 1,
            item.title,
            source,
            item.category.label(),
            truncate_chars(&item.body, max_chars),
        ));
    }
    parts.push("\n请对以上新闻进行专业点评和分析。".to_string());
    parts.join("\n")
}

/// Full user instruction wrapping the formatted news block.
pub fn build_instruction(news_block: &str) -> String {
    format!(
        "\n请作为资深体育评论员，对以下今日体育新闻进行**关键内容提取**和**专业点评**。\n\n{news_block}\n\n{REPORT_REQUIREMENTS}"
    )
}
