pub mod content;
pub mod site_analysis;

pub use content::AnalysisContent;
pub use site_analysis::SiteAnalysis;
