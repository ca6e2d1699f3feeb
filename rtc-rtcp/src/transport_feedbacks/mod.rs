pub mod transport_layer_feedback;
