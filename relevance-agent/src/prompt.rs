//! Relevance prompt assembly.

use contribution::Comment;

const PREAMBLE: &str = "I need to evaluate the relevance of GitHub contributors' comments to a specific issue specification. Specifically, I'm interested in how much each comment helps to further define the issue specification or contributes new information or research relevant to the issue. Please provide a float between 0 and 1 to represent the degree of relevance. A score of 1 indicates that the comment is entirely relevant and adds significant value to the issue, whereas a score of 0 indicates no relevance or added value. Each contributor's comment is on a new line.";

const QUESTION: &str = "To what degree are each of the comments in the conversation relevant and valuable to further defining the issue specification? Please reply with an array of float numbers between 0 and 1, corresponding to each comment in the order they appear. Each float should represent the degree of relevance and added value of the comment to the issue.";

/// Build the relevance prompt for a specification and its conversation.
///
/// Comments appear one per line in input order; the reply is expected to be a
/// JSON array with exactly one number per comment.
pub fn build_prompt(specification: &str, comments: &[Comment]) -> String {
    let conversation = comments
        .iter()
        .map(|comment| comment.body.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = String::with_capacity(
        PREAMBLE.len() + QUESTION.len() + specification.len() + conversation.len() + 128,
    );
    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\nIssue Specification:\n```\n");
    prompt.push_str(specification);
    prompt.push_str("\n```\n\nConversation:\n```\n");
    prompt.push_str(&conversation);
    prompt.push_str("\n```\n\n\n");
    prompt.push_str(QUESTION);
    prompt.push_str(&format!(
        " The total length of the array in your response should equal exactly {} elements.",
        comments.len()
    ));
    prompt
}
