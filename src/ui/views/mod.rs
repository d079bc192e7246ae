mod new_request;
mod report;
mod request_list;
mod settings;

pub use new_request::NewRequestView;
pub use report::{report_table, ReportView};
pub use request_list::RequestListView;
pub use settings::SettingsView;

use crate::store::{Feature, StoreDeps};
use crate::ui::view::View;

/// Build the view for `feature` together with a fresh store, and start its
/// initial loads.
pub fn mount(feature: Feature, deps: &StoreDeps) -> Box<dyn View> {
  let deps = deps.clone();
  match feature {
    Feature::NewRequest => Box::new(NewRequestView::new(deps)),
    Feature::Requests => Box::new(RequestListView::new(deps)),
    Feature::Report => Box::new(ReportView::new(deps)),
    Feature::Settings => Box::new(SettingsView::new(deps)),
  }
}
