use crate::parser::thread::ThreadResult;

const TEMPLATE: &str = "\
You are an expert at summarizing Twitter/X threads. Read the following thread and write a concise, informative summary.

Thread Content:
{thread_content}

Instructions:
1. Write exactly 5 bullet points that capture the main ideas and key insights
2. Keep each bullet point to 1-2 sentences
3. Focus on the most important takeaways and actionable insights
4. Keep the original tone and perspective of the author
5. Do not repeat yourself between bullet points
6. Use clear, accessible language

Format your answer as:
• [First main point]
• [Second main point]
• [Third main point]
• [Fourth main point]
• [Fifth main point]

Summary:
";

pub fn format_thread(thread: &ThreadResult) -> String {
    if thread.posts().is_empty() {
        return "No posts found".to_string();
    }
    let mut out = format!("Thread by @{}\n\n", thread.author());
    for (i, post) in thread.posts().iter().enumerate() {
        let text = post.text.trim();
        if !text.is_empty() {
            out.push_str(&format!("Post {}: {}\n\n", i + 1, text));
        }
    }
    out
}

pub fn build_prompt(thread: &ThreadResult) -> String {
    TEMPLATE.replace("{thread_content}", &format_thread(thread))
}
