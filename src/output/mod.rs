pub mod formatter;

pub use formatter::{
    format_methodology, format_model_list, format_result_detail, format_results_table,
    format_tsv, should_use_colors,
};
