mod event;
mod wifi;
